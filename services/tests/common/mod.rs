//! Shared test utilities for integration tests.
//!
//! - `test_server` / `test_app` build the router over in-memory storage
//! - `token_for` mints a bearer token accepted by `Config::new_for_test`
//! - `png` / `gradient_png` produce decodable images of a given size

use axum::Router;
use axum_test::TestServer;
use collage_services::{
    auth::issue_session_token,
    config::Config,
    database::{MockSqlStorage, SqlStorage},
    routes,
    storage::{FileStorage, StorageError},
};
use futures_util::TryStreamExt;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// Owner of the collections seeded by the tests.
#[allow(dead_code)]
pub const OWNER_ID: i64 = 1;

/// A user contributing to someone else's collection.
#[allow(dead_code)]
pub const CONTRIBUTOR_ID: i64 = 2;

#[allow(dead_code)]
pub fn token_for(user_id: i64) -> String {
    issue_session_token(user_id, Config::new_for_test().jwt_secret()).unwrap()
}

pub fn test_app<S, F>(sql_storage: S, file_storage: F, config: Config) -> Router
where
    S: SqlStorage,
    F: FileStorage<Error = StorageError>,
{
    routes(sql_storage, file_storage, config)
}

#[allow(dead_code)]
pub fn test_server<S, F>(sql_storage: S, file_storage: F) -> TestServer
where
    S: SqlStorage,
    F: FileStorage<Error = StorageError>,
{
    test_server_with_config(sql_storage, file_storage, Config::new_for_test())
}

#[allow(dead_code)]
pub fn test_server_with_config<S, F>(sql_storage: S, file_storage: F, config: Config) -> TestServer
where
    S: SqlStorage,
    F: FileStorage<Error = StorageError>,
{
    TestServer::new(test_app(sql_storage, file_storage, config)).unwrap()
}

/// Storage with one collection owned by [`OWNER_ID`].
#[allow(dead_code)]
pub fn storage_with_collection() -> (MockSqlStorage, i64) {
    let sql = MockSqlStorage::new();
    let collection = sql.seed_collection("Sunsets", OWNER_ID);
    (sql, collection.id)
}

#[allow(dead_code)]
pub fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    encode(DynamicImage::ImageRgb8(image), ImageFormat::Png)
}

#[allow(dead_code)]
pub fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Vec::new();
    image.write_to(&mut Cursor::new(&mut out), format).unwrap();
    out
}

/// Read a stored object back in full.
#[allow(dead_code)]
pub async fn read_object<F>(storage: &F, reference: &str) -> Vec<u8>
where
    F: FileStorage<Error = StorageError>,
{
    storage
        .open_read_stream(reference)
        .await
        .unwrap()
        .map_ok(|chunk| chunk.to_vec())
        .try_concat()
        .await
        .unwrap()
}
