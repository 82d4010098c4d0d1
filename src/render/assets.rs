//! Letterhead, signature and footer images
//!
//! Each image is looked up under every search root, trying a fixed list of
//! relative paths in order. The first file that decodes wins; when none does
//! the certificate falls back to text.
//!
//! PNG and JPEG files are decoded with the `image` crate. Transparency is
//! flattened onto white since the PDF writer takes no alpha channel.

use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::config::AssetsConfig;
use crate::core::project::Project;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path}: unsupported image ({reason})")]
    Unsupported { path: PathBuf, reason: String },

    #[error("{path}: cannot decode image: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Which certificate image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Header,
    Signature,
    Footer,
}

impl AssetKind {
    /// Relative paths tried under each search root, in order
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            AssetKind::Header => &[
                "cabecalho.png",
                "cabecalho.jpg",
                "header.png",
                "header.jpg",
                "images/certificados/cabecalho.png",
                "images/certificado-cabecalho.png",
                "images/certificado-cabeçalho.png",
                "public/images/certificados/cabecalho.png",
                "public/images/certificado-cabecalho.png",
            ],
            AssetKind::Signature => &[
                "assinatura.png",
                "assinatura.jpg",
                "signature.png",
                "signature.jpg",
                "images/certificados/assinatura.png",
                "images/certificado-assinatura.png",
                "public/images/certificados/assinatura.png",
                "public/images/certificado-assinatura.png",
            ],
            AssetKind::Footer => &[
                "rodape.png",
                "rodape.jpg",
                "footer.png",
                "footer.jpg",
                "images/certificados/rodape.png",
                "images/certificado-rodapé.png",
                "public/images/certificados/rodape.png",
                "public/images/certificado-rodapé.png",
            ],
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Header => write!(f, "header"),
            AssetKind::Signature => write!(f, "signature"),
            AssetKind::Footer => write!(f, "footer"),
        }
    }
}

/// A decoded certificate image, always without an alpha channel
#[derive(Debug, Clone)]
pub struct Image {
    pub data: DynamicImage,
    pub source: PathBuf,
}

impl Image {
    pub fn load(path: &Path) -> Result<Self, AssetError> {
        let bytes = std::fs::read(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes, path)
    }

    /// Decode PNG or JPEG data; transparent pixels are composited onto white
    pub fn from_bytes(bytes: &[u8], path: &Path) -> Result<Self, AssetError> {
        let format = image::guess_format(bytes).map_err(|_| AssetError::Unsupported {
            path: path.to_path_buf(),
            reason: "not a PNG or JPEG file".to_string(),
        })?;
        if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg) {
            return Err(AssetError::Unsupported {
                path: path.to_path_buf(),
                reason: format!("{:?} images are not supported", format),
            });
        }
        let decoded = image::load_from_memory_with_format(bytes, format).map_err(|source| {
            AssetError::Decode {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Ok(Self {
            data: flatten(decoded),
            source: path.to_path_buf(),
        })
    }

    pub fn width(&self) -> u32 {
        self.data.dimensions().0
    }

    pub fn height(&self) -> u32 {
        self.data.dimensions().1
    }

    /// Height to draw at a given width, keeping the aspect ratio
    pub fn height_for(&self, width: f32) -> f32 {
        let (w, h) = self.data.dimensions();
        if w == 0 {
            return 0.0;
        }
        width * h as f32 / w as f32
    }
}

fn flatten(image: DynamicImage) -> DynamicImage {
    if !image.color().has_alpha() {
        return image;
    }
    let rgba = image.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let over_white = |c: u8| {
            let alpha = u16::from(a);
            ((u16::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8
        };
        rgb.put_pixel(x, y, Rgb([over_white(r), over_white(g), over_white(b)]));
    }
    DynamicImage::ImageRgb8(rgb)
}

/// Images available to the renderer
#[derive(Debug, Clone, Default)]
pub struct Assets {
    pub header: Option<Image>,
    pub signature: Option<Image>,
    pub footer: Option<Image>,
}

impl Assets {
    /// No images: everything falls back to text
    pub fn none() -> Self {
        Self::default()
    }

    /// Look up all three images under the given roots
    pub fn discover(roots: &[PathBuf]) -> Self {
        Self {
            header: find(AssetKind::Header, roots),
            signature: find(AssetKind::Signature, roots),
            footer: find(AssetKind::Footer, roots),
        }
    }

    pub fn get(&self, kind: AssetKind) -> Option<&Image> {
        match kind {
            AssetKind::Header => self.header.as_ref(),
            AssetKind::Signature => self.signature.as_ref(),
            AssetKind::Footer => self.footer.as_ref(),
        }
    }
}

/// Search roots: configured paths, then the project assets directory and root
pub fn search_roots(project: Option<&Project>, config: &AssetsConfig) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = config
        .search_paths
        .iter()
        .map(|p| match project {
            Some(project) => project.resolve(p),
            None => p.clone(),
        })
        .collect();
    if let Some(project) = project {
        roots.push(project.assets_dir());
        roots.push(project.root().to_path_buf());
    }
    roots
}

/// First candidate of `kind` that loads
pub fn find(kind: AssetKind, roots: &[PathBuf]) -> Option<Image> {
    for root in roots {
        for candidate in kind.candidates() {
            let path = root.join(candidate);
            if !path.is_file() {
                continue;
            }
            match Image::load(&path) {
                Ok(image) => {
                    tracing::debug!(%kind, path = %path.display(), "using image");
                    return Some(image);
                }
                Err(e) => tracing::warn!("{} image skipped: {}", kind, e),
            }
        }
    }
    tracing::debug!(%kind, "no image found, using text");
    None
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn encode(image: DynamicImage, format: ImageOutputFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    /// Solid grey RGB PNG
    pub(crate) fn png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb([90, 90, 90]));
        encode(DynamicImage::ImageRgb8(image), ImageOutputFormat::Png)
    }

    pub(crate) fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb([200, 30, 30]));
        encode(DynamicImage::ImageRgb8(image), ImageOutputFormat::Jpeg(90))
    }

    #[test]
    fn test_load_png() {
        let image = Image::from_bytes(&png(515, 100), Path::new("h.png")).unwrap();
        assert_eq!((image.width(), image.height()), (515, 100));
        assert!((image.height_for(257.5) - 50.0).abs() < 1e-4);
        assert_eq!(image.source, PathBuf::from("h.png"));
    }

    #[test]
    fn test_load_jpeg() {
        let image = Image::from_bytes(&jpeg(300, 120), Path::new("s.jpg")).unwrap();
        assert_eq!((image.width(), image.height()), (300, 120));
        assert!(!image.data.color().has_alpha());
    }

    #[test]
    fn test_alpha_is_flattened_onto_white() {
        let mut rgba = RgbaImage::from_pixel(4, 2, Rgba([0, 0, 0, 0]));
        rgba.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
        let bytes = encode(DynamicImage::ImageRgba8(rgba), ImageOutputFormat::Png);

        let image = Image::from_bytes(&bytes, Path::new("a.png")).unwrap();
        assert!(!image.data.color().has_alpha());
        let rgb = image.data.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(rgb.get_pixel(3, 1).0, [255, 255, 255]);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let result = Image::from_bytes(b"not an image at all", Path::new("x.gif"));
        assert!(matches!(result, Err(AssetError::Unsupported { .. })));
    }

    #[test]
    fn test_truncated_png_fails_to_decode() {
        let bytes = png(40, 40);
        let result = Image::from_bytes(&bytes[..bytes.len() / 2], Path::new("t.png"));
        assert!(matches!(result, Err(AssetError::Decode { .. })));
    }

    #[test]
    fn test_find_skips_broken_candidates() {
        let tmp = TempDir::new().unwrap();
        let broken = png(10, 10);
        std::fs::write(tmp.path().join("cabecalho.png"), &broken[..20]).unwrap();
        let nested = tmp.path().join("images/certificados");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("cabecalho.png"), png(20, 10)).unwrap();

        let roots = vec![tmp.path().to_path_buf()];
        let header = find(AssetKind::Header, &roots).unwrap();
        assert_eq!(header.width(), 20);
        assert!(find(AssetKind::Footer, &roots).is_none());
    }

    #[test]
    fn test_search_roots_include_project_assets() {
        let tmp = TempDir::new().unwrap();
        let project = Project::init(tmp.path()).unwrap();
        let config = AssetsConfig {
            search_paths: vec![PathBuf::from("branding")],
        };
        let roots = search_roots(Some(&project), &config);
        assert_eq!(roots[0], tmp.path().join("branding"));
        assert_eq!(roots[1], project.assets_dir());
    }
}
