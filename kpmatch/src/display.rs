use image::RgbImage;
use log::*;
use std::io;
use std::time::Duration;

/// Something that can show a rendered match image to the user.
pub trait Display {
    fn show(&mut self, title: &str, image: &RgbImage) -> io::Result<()>;
}

/// Opens images with the system's default image viewer.
///
/// The image goes to a temporary PNG file which is removed once the viewer
/// had `seconds` to pick it up.
#[derive(Debug, Clone, Copy)]
pub struct SystemViewer {
    pub seconds: u64,
}

impl SystemViewer {
    pub fn new(seconds: u64) -> Self {
        Self { seconds }
    }
}

impl Display for SystemViewer {
    fn show(&mut self, title: &str, image: &RgbImage) -> io::Result<()> {
        let path = tempfile::Builder::new()
            .prefix("kpmatch-")
            .suffix(".png")
            .tempfile()?
            .into_temp_path();
        image
            .save(&path)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        info!("showing {} from {}", title, path.display());
        open::that(&path)?;
        // Viewers may start in the background, so there is no telling when
        // they are done reading the file.
        std::thread::sleep(Duration::from_secs(self.seconds));
        Ok(())
    }
}

/// Shows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDisplay;

impl Display for NoDisplay {
    fn show(&mut self, title: &str, image: &RgbImage) -> io::Result<()> {
        info!(
            "not showing {} ({}x{}), display is disabled",
            title,
            image.width(),
            image.height()
        );
        Ok(())
    }
}
