//! Image fetcher against a local HTTP server

mod helpers;

use helpers::{png_bytes, start_image_server, BLUE, RED};
use sabueso_common::Error;
use sabueso_tagger::db::ImageRecord;
use sabueso_tagger::services::ImageFetcher;
use std::collections::HashMap;
use std::time::Duration;
use tempfile::TempDir;

fn record(id: i64, url: String, parent_id: i64) -> ImageRecord {
    ImageRecord { id, url, parent_id }
}

#[tokio::test]
async fn test_download_writes_one_file_per_row_in_order() {
    let red = png_bytes(4, 4, RED);
    let blue = png_bytes(4, 4, BLUE);
    let server = start_image_server(HashMap::from([
        ("red.png".to_string(), red.clone()),
        ("blue.png".to_string(), blue.clone()),
    ]))
    .await
    .unwrap();

    let temp_dir = TempDir::new().unwrap();
    let fetcher = ImageFetcher::new(server.media_prefix.clone(), Duration::from_secs(5)).unwrap();
    let records = vec![
        record(1, server.url_for("red.png"), 100),
        record(2, server.url_for("blue.png"), 200),
    ];

    let downloaded = fetcher.download(&records, temp_dir.path()).await.unwrap();

    assert_eq!(downloaded.len(), 2);
    assert_eq!(downloaded[0].path, temp_dir.path().join("red.png"));
    assert_eq!(downloaded[1].path, temp_dir.path().join("blue.png"));
    assert_eq!((downloaded[0].id, downloaded[0].parent_id), (1, 100));
    assert!(downloaded.iter().all(|d| !d.skipped));

    assert_eq!(std::fs::read(&downloaded[0].path).unwrap(), red);
    assert_eq!(std::fs::read(&downloaded[1].path).unwrap(), blue);
    assert_eq!(server.hits(), vec!["red.png", "blue.png"]);
}

#[tokio::test]
async fn test_download_creates_missing_directory() {
    let server = start_image_server(HashMap::from([(
        "red.png".to_string(),
        png_bytes(2, 2, RED),
    )]))
    .await
    .unwrap();

    let temp_dir = TempDir::new().unwrap();
    let save_dir = temp_dir.path().join("input").join("download");
    let fetcher = ImageFetcher::new(server.media_prefix.clone(), Duration::from_secs(5)).unwrap();

    let downloaded = fetcher
        .download(&[record(1, server.url_for("red.png"), 1)], &save_dir)
        .await
        .unwrap();

    assert!(downloaded[0].path.starts_with(&save_dir));
    assert!(downloaded[0].path.exists());
}

#[tokio::test]
async fn test_failed_fetch_aborts_batch_and_keeps_earlier_files() {
    let server = start_image_server(HashMap::from([
        ("first.png".to_string(), png_bytes(2, 2, RED)),
        ("third.png".to_string(), png_bytes(2, 2, BLUE)),
    ]))
    .await
    .unwrap();

    let temp_dir = TempDir::new().unwrap();
    let fetcher = ImageFetcher::new(server.media_prefix.clone(), Duration::from_secs(5)).unwrap();
    let missing_url = server.url_for("second.png");
    let records = vec![
        record(1, server.url_for("first.png"), 1),
        record(2, missing_url.clone(), 2),
        record(3, server.url_for("third.png"), 3),
    ];

    let result = fetcher.download(&records, temp_dir.path()).await;

    match result {
        Err(Error::Download { url, reason }) => {
            assert_eq!(url, missing_url);
            assert!(reason.contains("404"), "reason: {}", reason);
        }
        other => panic!("expected download error, got {:?}", other),
    }
    assert!(temp_dir.path().join("first.png").exists());
    assert!(!temp_dir.path().join("second.png").exists());
    assert!(!temp_dir.path().join("third.png").exists());
    assert_eq!(server.hits(), vec!["first.png", "second.png"]);
}

#[tokio::test]
async fn test_unreachable_host_is_download_error() {
    // Bind then drop to get a port with nothing listening
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let temp_dir = TempDir::new().unwrap();
    let fetcher = ImageFetcher::new("", Duration::from_secs(2)).unwrap();
    let url = format!("http://{}/media/a.png", addr);

    let result = fetcher.download(&[record(1, url, 1)], temp_dir.path()).await;

    let err = result.unwrap_err();
    assert!(matches!(err, Error::Download { .. }));
    assert_eq!(err.exit_code(), 3);
}

#[tokio::test]
async fn test_existing_file_is_not_requested_again() {
    let server = start_image_server(HashMap::from([(
        "red.png".to_string(),
        png_bytes(2, 2, RED),
    )]))
    .await
    .unwrap();

    // A readable image already under the derived name is kept as is
    let cached = png_bytes(2, 2, BLUE);
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("red.png"), &cached).unwrap();

    let fetcher = ImageFetcher::new(server.media_prefix.clone(), Duration::from_secs(5)).unwrap();
    let downloaded = fetcher
        .download(&[record(1, server.url_for("red.png"), 1)], temp_dir.path())
        .await
        .unwrap();

    assert!(downloaded[0].skipped);
    assert!(server.hits().is_empty());
    assert_eq!(std::fs::read(temp_dir.path().join("red.png")).unwrap(), cached);
}

fn leftover_part_files(dir: &std::path::Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".part"))
        .collect()
}

#[tokio::test]
async fn test_truncated_file_is_downloaded_again() {
    let red = png_bytes(8, 8, RED);
    let server = start_image_server(HashMap::from([("red.png".to_string(), red.clone())]))
        .await
        .unwrap();

    // Leftover from an interrupted run
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("red.png"), &red[..red.len() / 2]).unwrap();

    let fetcher = ImageFetcher::new(server.media_prefix.clone(), Duration::from_secs(5)).unwrap();
    let downloaded = fetcher
        .download(&[record(1, server.url_for("red.png"), 1)], temp_dir.path())
        .await
        .unwrap();

    assert!(!downloaded[0].skipped);
    assert_eq!(server.hits(), vec!["red.png"]);
    assert_eq!(std::fs::read(&downloaded[0].path).unwrap(), red);
    assert!(image::open(&downloaded[0].path).is_ok());
    assert!(leftover_part_files(temp_dir.path()).is_empty());
}

#[tokio::test]
async fn test_failed_fetch_leaves_no_partial_file() {
    let server = start_image_server(HashMap::new()).await.unwrap();

    let temp_dir = TempDir::new().unwrap();
    let fetcher = ImageFetcher::new(server.media_prefix.clone(), Duration::from_secs(5)).unwrap();
    let result = fetcher
        .download(&[record(1, server.url_for("gone.png"), 1)], temp_dir.path())
        .await;

    assert!(matches!(result, Err(Error::Download { .. })));
    assert!(std::fs::read_dir(temp_dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn test_shared_file_name_is_fetched_once_and_not_counted_as_skipped() {
    let server = start_image_server(HashMap::from([(
        "red.png".to_string(),
        png_bytes(2, 2, RED),
    )]))
    .await
    .unwrap();

    let temp_dir = TempDir::new().unwrap();
    let fetcher = ImageFetcher::new(server.media_prefix.clone(), Duration::from_secs(5)).unwrap();
    let records = vec![
        record(1, server.url_for("red.png"), 10),
        record(2, server.url_for("red.png"), 20),
    ];

    let downloaded = fetcher.download(&records, temp_dir.path()).await.unwrap();

    assert_eq!(server.hits(), vec!["red.png"]);
    assert_eq!(downloaded.len(), 2);
    assert_eq!(downloaded[0].path, downloaded[1].path);
    assert!(downloaded.iter().all(|d| !d.skipped));
}
