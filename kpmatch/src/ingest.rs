use crate::{Error, Result};
use image::GrayImage;
use log::*;
use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// The list of train image filenames and the directory they live in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Directory prefix of the manifest itself, including its trailing
    /// separator, or empty if the manifest path has no separator.
    pub dir: String,
    /// Filenames in manifest order, relative to `dir`.
    pub names: Vec<String>,
}

impl Manifest {
    /// Where the train image `name` is loaded from.
    pub fn path_of(&self, name: &str) -> PathBuf {
        PathBuf::from(format!("{}{}", self.dir, name))
    }
}

/// The directory prefix of `path`: everything up to and including the last
/// backslash, or if there is none, the last slash.
fn dir_prefix(path: &str) -> String {
    path.rfind('\\')
        .or_else(|| path.rfind('/'))
        .map(|pos| path[..=pos].to_owned())
        .unwrap_or_default()
}

/// Parse the train image manifest at `path`.
///
/// There is one filename per line and the list ends at the first empty line.
/// Line terminators are removed, other whitespace is kept as part of the name.
/// Lines that are not valid UTF-8 are decoded lossily, so they keep their slot
/// and fail to load like any other missing image.
pub fn read_train_filenames(path: impl AsRef<Path>) -> Result<Manifest> {
    let path = path.as_ref();
    let no_filenames = || Error::NoTrainFilenames {
        path: path.to_owned(),
    };
    let contents = std::fs::read(path).map_err(|e| {
        warn!("failed to read manifest {}: {}", path.display(), e);
        no_filenames()
    })?;
    let names: Vec<String> = contents
        .split(|&byte| byte == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .take_while(|line| !line.is_empty())
        .map(|line| {
            let name = String::from_utf8_lossy(line);
            if let Cow::Owned(_) = name {
                warn!("manifest line {:?} is not valid UTF-8", name);
            }
            name.into_owned()
        })
        .collect();
    if names.is_empty() {
        return Err(no_filenames());
    }
    Ok(Manifest {
        dir: dir_prefix(&path.to_string_lossy()),
        names,
    })
}

/// The query image and every train slot, loaded as 8-bit grayscale.
#[derive(Debug, Clone)]
pub struct ImageSet {
    pub query: GrayImage,
    /// One slot per manifest name; `None` where the image could not be read.
    pub train_images: Vec<Option<GrayImage>>,
    pub train_names: Vec<String>,
}

impl ImageSet {
    pub fn loaded_count(&self) -> usize {
        self.train_images.iter().filter(|slot| slot.is_some()).count()
    }
}

/// Load the query image, then the manifest, then every train image it names.
///
/// A train image that can't be read leaves an empty slot and a warning. The
/// load only fails as a whole if the query, the manifest, or every single
/// train image is unreadable.
pub fn read_images(
    query_path: impl AsRef<Path>,
    manifest_path: impl AsRef<Path>,
) -> Result<ImageSet> {
    let query_path = query_path.as_ref();
    info!("reading the images");
    let query = image::open(query_path)
        .map_err(|source| Error::QueryImage {
            path: query_path.to_owned(),
            source,
        })?
        .to_luma8();
    debug!(
        "query image {} is {}x{}",
        query_path.display(),
        query.width(),
        query.height()
    );

    let manifest = read_train_filenames(manifest_path)?;
    let train_images: Vec<Option<GrayImage>> = manifest
        .names
        .iter()
        .map(|name| {
            let path = manifest.path_of(name);
            match image::open(&path) {
                Ok(image) => Some(image.to_luma8()),
                Err(e) => {
                    warn!("train image {} can not be read: {}", path.display(), e);
                    None
                }
            }
        })
        .collect();

    let images = ImageSet {
        query,
        train_images,
        train_names: manifest.names,
    };
    match images.loaded_count() {
        0 => Err(Error::NoTrainImages {
            count: images.train_names.len(),
        }),
        loaded => {
            info!("{} train images were read", loaded);
            Ok(images)
        }
    }
}
