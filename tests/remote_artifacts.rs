mod support;

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;

use penguin_serve::model::{ArtifactSource, LoadError, RemoteObject, SourceError, load_artifacts};
use support::fixture;

/// Serve a single HTTP response and hand back the request line.
fn serve_once(status: &str, body: Vec<u8>) -> (String, thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    let status = status.to_string();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = [0u8; 4096];
        let read = stream.read(&mut buf).unwrap();
        let request = String::from_utf8_lossy(&buf[..read]).to_string();
        let head = format!(
            "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        stream.write_all(head.as_bytes()).unwrap();
        stream.write_all(&body).unwrap();
        request.lines().next().unwrap_or_default().to_string()
    });
    (endpoint, handle)
}

#[test]
fn remote_model_is_downloaded_verified_and_cleaned_up() {
    let bytes = std::fs::read(fixture("model.json")).unwrap();
    let (endpoint, server) = serve_once("200 OK", bytes);
    let source = RemoteObject::from_uri("gs://penguin-models/runs/7/model.json")
        .unwrap()
        .with_endpoint(endpoint);

    let artifacts = load_artifacts(&source, &fixture("metadata.json"), None).unwrap();
    assert_eq!(artifacts.metadata.label_classes().len(), 3);
    assert_eq!(
        server.join().unwrap(),
        "GET /storage/v1/b/penguin-models/o/runs%2F7%2Fmodel.json?alt=media HTTP/1.1"
    );
}

#[test]
fn remote_object_missing_is_fatal() {
    let (endpoint, server) = serve_once("404 Not Found", b"{}".to_vec());
    let source = RemoteObject::new("penguin-models", "model.json")
        .unwrap()
        .with_endpoint(endpoint);
    let err = load_artifacts(&source, &fixture("metadata.json"), None).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Source(SourceError::Status { status: 404, .. })
    ));
    server.join().unwrap();
}

#[test]
fn scratch_file_is_removed_after_fetch_drops() {
    let (endpoint, server) = serve_once("200 OK", b"not a model".to_vec());
    let source = RemoteObject::new("penguin-models", "model.json")
        .unwrap()
        .with_endpoint(endpoint);
    let fetched = source.fetch().unwrap();
    let path = fetched.path().to_path_buf();
    assert!(path.is_file());
    drop(fetched);
    assert!(!path.exists());
    server.join().unwrap();
}

#[test]
fn malformed_remote_model_is_fatal() {
    let (endpoint, server) = serve_once("200 OK", b"not a model".to_vec());
    let source = RemoteObject::new("penguin-models", "model.json")
        .unwrap()
        .with_endpoint(endpoint);
    let err = load_artifacts(&source, &fixture("metadata.json"), None).unwrap_err();
    assert!(matches!(err, LoadError::Model(_)), "{err}");
    server.join().unwrap();
}
