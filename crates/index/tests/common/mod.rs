#![allow(dead_code)]

use image::{GrayImage, ImageFormat, RgbImage, RgbaImage};
use imgdex_cache::MemoryStore;
use imgdex_extract::ImageInfo;
use imgdex_index::{Extension, IMAGE_INFO_INDEX, IndexStore};
use imgdex_vfs::FsHandle;
use imgdex_vfs::backend::MockFileSystem;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

pub fn encode(image: impl FnOnce(&mut Cursor<Vec<u8>>)) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image(&mut buffer);
    buffer.into_inner()
}

pub fn rgb_png(width: u32, height: u32) -> Vec<u8> {
    encode(|buffer| RgbImage::new(width, height).write_to(buffer, ImageFormat::Png).unwrap())
}

pub fn rgba_png(width: u32, height: u32) -> Vec<u8> {
    encode(|buffer| RgbaImage::new(width, height).write_to(buffer, ImageFormat::Png).unwrap())
}

pub fn gray_png(width: u32, height: u32) -> Vec<u8> {
    encode(|buffer| GrayImage::new(width, height).write_to(buffer, ImageFormat::Png).unwrap())
}

pub fn rgb_bmp(width: u32, height: u32) -> Vec<u8> {
    encode(|buffer| RgbImage::new(width, height).write_to(buffer, ImageFormat::Bmp).unwrap())
}

/// A PNG whose signature no longer says PNG.
pub fn corrupt_png() -> Vec<u8> {
    let mut bytes = rgb_png(10, 20);
    bytes[1] = b'X';
    bytes
}

/// Extracts like the real thing, but slowly enough for a test to get in the
/// way of it.
pub fn slow_index(bytes: &[u8]) -> Option<ImageInfo> {
    std::thread::sleep(Duration::from_millis(300));
    imgdex_extract::extract(bytes)
}

pub const SLOW_IMAGE_INFO_INDEX: Extension<ImageInfo> = Extension {
    indexer: slow_index,
    ..IMAGE_INFO_INDEX
};

pub struct Fixture {
    pub mock: Arc<MockFileSystem>,
    pub fs: FsHandle,
    pub persistence: Arc<MemoryStore>,
}
impl Fixture {
    pub fn new(files: impl IntoIterator<Item = (&'static str, Vec<u8>)>) -> Self {
        let mock = Arc::new(MockFileSystem::with_files(files));
        let fs: FsHandle = mock.clone();
        Self { mock, fs, persistence: Arc::new(MemoryStore::new()) }
    }

    pub async fn store(&self, extension: Extension<ImageInfo>) -> IndexStore<ImageInfo> {
        IndexStore::open(extension, self.persistence.clone(), None).await.unwrap()
    }
}
