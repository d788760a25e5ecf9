mod info;

pub use self::info::ImageInfo;
