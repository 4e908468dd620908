//! Crop and hue edits.
//!
//! Transforms are pure functions over a decoded image. Persisting an edit
//! goes through [`commit_edit`]: the current file is copied to the first
//! backup path that does not exist yet and flushed, the edited pixels are
//! encoded to a sibling temporary file, and that file is renamed over the
//! original. An existing backup is never overwritten.

use image::{ColorType, DynamicImage, ImageFormat, Rgb, Rgba, RgbImage, RgbaImage};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Cursor};
use std::path::{Path, PathBuf};

use crate::error::{PixvaultError, Result};
use crate::storage::ensure_parent;
use crate::types::{CropRequest, EditRequest, HueRequest};

/// Pixel rectangle kept by a crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Outcome of an in-place edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedEdit {
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    /// Where the pre-edit file was copied
    pub backup: PathBuf,
}

pub fn validate_crop(req: &CropRequest) -> Result<()> {
    for (name, value) in [
        ("top", req.top),
        ("bottom", req.bottom),
        ("left", req.left),
        ("right", req.right),
    ] {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(PixvaultError::validation(format!(
                "crop {name} must be between 0 and 100, got {value}"
            )));
        }
    }
    if req.left + req.right >= 100.0 {
        return Err(PixvaultError::validation("crop left + right must be below 100"));
    }
    if req.top + req.bottom >= 100.0 {
        return Err(PixvaultError::validation("crop top + bottom must be below 100"));
    }
    Ok(())
}

pub fn validate_hue(req: &HueRequest) -> Result<()> {
    if !req.delta.is_finite() || !(-180.0..=180.0).contains(&req.delta) {
        return Err(PixvaultError::validation(format!(
            "hue delta must be between -180 and 180, got {}",
            req.delta
        )));
    }
    Ok(())
}

pub fn validate(req: &EditRequest) -> Result<()> {
    match req {
        EditRequest::Crop(crop) => validate_crop(crop),
        EditRequest::Hue(hue) => validate_hue(hue),
    }
}

/// Pixel box for a validated crop. Edges are truncated toward zero.
pub fn crop_box(width: u32, height: u32, req: &CropRequest) -> Result<CropBox> {
    let (w, h) = (f64::from(width), f64::from(height));
    let left_px = (w * req.left / 100.0) as u32;
    let right_px = (w * (1.0 - req.right / 100.0)) as u32;
    let top_px = (h * req.top / 100.0) as u32;
    let bottom_px = (h * (1.0 - req.bottom / 100.0)) as u32;

    if left_px >= right_px || top_px >= bottom_px {
        return Err(PixvaultError::validation(format!(
            "crop leaves an empty region of a {width}x{height} image"
        )));
    }
    Ok(CropBox {
        x: left_px,
        y: top_px,
        width: right_px - left_px,
        height: bottom_px - top_px,
    })
}

/// Hue offset on the 256-step wheel: `round(delta / 360 * 256) mod 256`.
pub fn hue_shift_steps(delta: f64) -> u8 {
    let steps = (delta / 360.0 * 256.0).round_ties_even() as i64;
    steps.rem_euclid(256) as u8
}

pub fn apply_crop(image: &DynamicImage, req: &CropRequest) -> Result<DynamicImage> {
    validate_crop(req)?;
    let b = crop_box(image.width(), image.height(), req)?;
    Ok(image.crop_imm(b.x, b.y, b.width, b.height))
}

/// Rotate hue in 8-bit HSV space, keeping alpha, the color model and the
/// channel depth.
///
/// 16-bit and float images are shifted at 8-bit precision and widened back.
pub fn apply_hue(image: &DynamicImage, req: &HueRequest) -> Result<DynamicImage> {
    validate_hue(req)?;
    let steps = hue_shift_steps(req.delta);
    if steps == 0 {
        return Ok(image.clone());
    }

    let shifted = match image {
        // Gray pixels carry no hue.
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_) => image.clone(),
        DynamicImage::ImageRgb8(rgb) => DynamicImage::ImageRgb8(shift_rgb(rgb, steps)),
        DynamicImage::ImageRgba8(rgba) => DynamicImage::ImageRgba8(shift_rgba(rgba, steps)),
        other if other.color().has_alpha() => restore_color(
            DynamicImage::ImageRgba8(shift_rgba(&other.to_rgba8(), steps)),
            other.color(),
        ),
        other => restore_color(
            DynamicImage::ImageRgb8(shift_rgb(&other.to_rgb8(), steps)),
            other.color(),
        ),
    };
    Ok(shifted)
}

/// Convert an 8-bit result back to the source color type.
fn restore_color(image: DynamicImage, color: ColorType) -> DynamicImage {
    match color {
        ColorType::Rgb16 => image.to_rgb16().into(),
        ColorType::Rgba16 => image.to_rgba16().into(),
        ColorType::Rgb32F => image.to_rgb32f().into(),
        ColorType::Rgba32F => image.to_rgba32f().into(),
        _ => image,
    }
}

pub fn apply(image: &DynamicImage, req: &EditRequest) -> Result<DynamicImage> {
    match req {
        EditRequest::Crop(crop) => apply_crop(image, crop),
        EditRequest::Hue(hue) => apply_hue(image, hue),
    }
}

/// Encode an edited image as PNG for previews.
pub fn encode_preview(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

/// Back up `source` to the first free path in `backups`, then atomically
/// replace it with `edited`.
///
/// The backup is fsynced before the original is touched. On an encode
/// failure the temporary file is removed and the original is left intact.
pub fn commit_edit(
    source: &Path,
    backups: &[PathBuf],
    edited: &DynamicImage,
    format: ImageFormat,
) -> Result<CommittedEdit> {
    let backup = create_backup(source, backups)?;
    tracing::debug!("Backed up {} to {}", source.display(), backup.display());

    let tmp = temp_sibling(source);
    if let Err(e) = write_encoded(&tmp, edited, format) {
        if let Err(cleanup) = std::fs::remove_file(&tmp) {
            tracing::warn!("Failed to remove {}: {}", tmp.display(), cleanup);
        }
        return Err(e);
    }
    std::fs::rename(&tmp, source)?;

    Ok(CommittedEdit {
        width: edited.width(),
        height: edited.height(),
        size_bytes: std::fs::metadata(source)?.len(),
        backup,
    })
}

/// Copy `source` into the first candidate that can be created exclusively.
fn create_backup(source: &Path, candidates: &[PathBuf]) -> Result<PathBuf> {
    for candidate in candidates {
        ensure_parent(candidate)?;
        let mut target = match OpenOptions::new().write(true).create_new(true).open(candidate) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        };
        let copied = File::open(source)
            .and_then(|mut from| io::copy(&mut from, &mut target))
            .and_then(|_| target.sync_all());
        if let Err(e) = copied {
            if let Err(cleanup) = std::fs::remove_file(candidate) {
                tracing::warn!("Failed to remove {}: {}", candidate.display(), cleanup);
            }
            return Err(e.into());
        }
        return Ok(candidate.clone());
    }
    let dir = candidates
        .first()
        .and_then(|c| c.parent())
        .map(Path::to_path_buf)
        .unwrap_or_default();
    Err(PixvaultError::storage(
        dir,
        format!("no free backup path for {}", source.display()),
    ))
}

fn write_encoded(path: &Path, image: &DynamicImage, format: ImageFormat) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    // JPEG has no alpha channel.
    if format == ImageFormat::Jpeg && image.color().has_alpha() {
        DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut writer, format)?;
    } else {
        image.write_to(&mut writer, format)?;
    }
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.edit.tmp"))
}

fn shift_rgb(image: &RgbImage, steps: u8) -> RgbImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let Rgb([r, g, b]) = *pixel;
        *pixel = Rgb(shift_pixel(r, g, b, steps));
    }
    out
}

fn shift_rgba(image: &RgbaImage, steps: u8) -> RgbaImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let Rgba([r, g, b, a]) = *pixel;
        let [r, g, b] = shift_pixel(r, g, b, steps);
        *pixel = Rgba([r, g, b, a]);
    }
    out
}

fn shift_pixel(r: u8, g: u8, b: u8, steps: u8) -> [u8; 3] {
    let (h, s, v) = rgb_to_hsv(r, g, b);
    hsv_to_rgb(h.wrapping_add(steps), s, v)
}

/// RGB to HSV with every channel quantized to 0..=255.
fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (rf, gf, bf) = (f64::from(r), f64::from(g), f64::from(b));
    let maxc = rf.max(gf).max(bf);
    let minc = rf.min(gf).min(bf);
    let v = maxc;
    if maxc == minc {
        return (0, 0, v as u8);
    }
    let span = maxc - minc;
    let s = span / maxc;
    let rc = (maxc - rf) / span;
    let gc = (maxc - gf) / span;
    let bc = (maxc - bf) / span;
    let h = if rf == maxc {
        bc - gc
    } else if gf == maxc {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };
    let h = (h / 6.0).rem_euclid(1.0);
    (quantize(h * 255.0), quantize(s * 255.0), v as u8)
}

fn hsv_to_rgb(h: u8, s: u8, v: u8) -> [u8; 3] {
    if s == 0 {
        return [v, v, v];
    }
    let hf = f64::from(h) / 255.0 * 6.0;
    let sf = f64::from(s) / 255.0;
    let vf = f64::from(v);
    let sector = hf.floor();
    let f = hf - sector;
    let p = vf * (1.0 - sf);
    let q = vf * (1.0 - sf * f);
    let t = vf * (1.0 - sf * (1.0 - f));
    let (r, g, b) = match sector as i64 % 6 {
        0 => (vf, t, p),
        1 => (q, vf, p),
        2 => (p, vf, t),
        3 => (p, q, vf),
        4 => (t, p, vf),
        _ => (vf, p, q),
    };
    [quantize(r), quantize(g), quantize(b)]
}

fn quantize(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    fn crop(top: f64, bottom: f64, left: f64, right: f64) -> CropRequest {
        CropRequest {
            top,
            bottom,
            left,
            right,
        }
    }

    #[test]
    fn test_crop_rejects_horizontal_overflow() {
        let err = validate_crop(&crop(10.0, 10.0, 80.0, 30.0)).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_crop_rejects_out_of_range_and_nan() {
        assert!(validate_crop(&crop(-1.0, 0.0, 0.0, 0.0)).is_err());
        assert!(validate_crop(&crop(0.0, 0.0, f64::NAN, 0.0)).is_err());
        assert!(validate_crop(&crop(50.0, 50.0, 0.0, 0.0)).is_err());
    }

    #[test]
    fn test_crop_box_truncates() {
        let b = crop_box(333, 200, &crop(10.0, 20.0, 10.0, 10.0)).unwrap();
        // left 33.3 -> 33, right 299.7 -> 299, top 20, bottom 160
        assert_eq!(
            b,
            CropBox {
                x: 33,
                y: 20,
                width: 266,
                height: 140
            }
        );
    }

    #[test]
    fn test_crop_output_matches_box() {
        let cases = [
            (0.0, 0.0, 0.0, 0.0),
            (25.0, 25.0, 25.0, 25.0),
            (0.0, 99.0, 99.0, 0.0),
            (12.5, 7.5, 3.0, 41.0),
        ];
        let image = DynamicImage::new_rgb8(400, 300);
        for (top, bottom, left, right) in cases {
            let req = crop(top, bottom, left, right);
            let b = crop_box(400, 300, &req).unwrap();
            let out = apply_crop(&image, &req).unwrap();
            assert_eq!(out.dimensions(), (b.width, b.height));
        }
    }

    #[test]
    fn test_crop_collapsing_to_nothing_is_rejected() {
        // 1px wide: left 0.4 -> 0, right 0.41 -> 0
        assert!(crop_box(1, 10, &crop(0.0, 0.0, 40.0, 59.0)).is_err());
    }

    #[test]
    fn test_hue_range() {
        assert!(validate_hue(&HueRequest { delta: 200.0 }).is_err());
        assert!(validate_hue(&HueRequest { delta: -180.0 }).is_ok());
        assert!(validate_hue(&HueRequest { delta: f64::INFINITY }).is_err());
    }

    #[test]
    fn test_hue_shift_steps() {
        assert_eq!(hue_shift_steps(0.0), 0);
        assert_eq!(hue_shift_steps(180.0), 128);
        assert_eq!(hue_shift_steps(-180.0), 128);
        assert_eq!(hue_shift_steps(90.0), 64);
        assert_eq!(hue_shift_steps(-30.0), 235);
    }

    #[test]
    fn test_hue_half_turn_swaps_red_to_cyan() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([255, 0, 0])));
        let out = apply_hue(&img, &HueRequest { delta: 180.0 }).unwrap();
        let Rgb([r, g, b]) = *out.as_rgb8().unwrap().get_pixel(0, 0);
        assert!(r < 5, "r = {r}");
        assert!(g > 250 && b > 250, "g = {g}, b = {b}");
    }

    #[test]
    fn test_hue_preserves_alpha_and_model() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 1, Rgba([0, 200, 0, 77])));
        let out = apply_hue(&img, &HueRequest { delta: 120.0 }).unwrap();
        let rgba = out.as_rgba8().unwrap();
        assert_eq!(rgba.get_pixel(0, 0)[3], 77);

        let gray = DynamicImage::new_luma8(4, 4);
        let out = apply_hue(&gray, &HueRequest { delta: 45.0 }).unwrap();
        assert!(out.as_luma8().is_some());
    }

    #[test]
    fn test_hue_keeps_wide_channel_depth() {
        let rgb16 = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([255, 0, 0])));
        let rgb16 = DynamicImage::from(rgb16.to_rgb16());
        let out = apply_hue(&rgb16, &HueRequest { delta: 180.0 }).unwrap();
        assert_eq!(out.color(), ColorType::Rgb16);
        let [r, g, b] = out.as_rgb16().unwrap().get_pixel(0, 0).0;
        assert!(r < 5 * 257, "r = {r}");
        assert!(g > 250 * 257 && b > 250 * 257, "g = {g}, b = {b}");

        let rgba32 = DynamicImage::from(DynamicImage::new_rgba8(2, 2).to_rgba32f());
        let out = apply_hue(&rgba32, &HueRequest { delta: 90.0 }).unwrap();
        assert_eq!(out.color(), ColorType::Rgba32F);

        let gray16 = DynamicImage::new_luma16(2, 2);
        let out = apply_hue(&gray16, &HueRequest { delta: 90.0 }).unwrap();
        assert_eq!(out.color(), ColorType::L16);
    }

    #[test]
    fn test_hsv_round_trip_gray_is_exact() {
        for v in [0u8, 1, 128, 255] {
            let (h, s, vv) = rgb_to_hsv(v, v, v);
            assert_eq!(hsv_to_rgb(h, s, vv), [v, v, v]);
        }
    }

    #[test]
    fn test_preview_is_png() {
        let bytes = encode_preview(&DynamicImage::new_rgb8(5, 5)).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[test]
    fn test_commit_edit_backs_up_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("2024/01/02/abcdEFGH.png");
        ensure_parent(&source).unwrap();
        let original = DynamicImage::new_rgb8(40, 20);
        original.save_with_format(&source, ImageFormat::Png).unwrap();
        let original_bytes = std::fs::read(&source).unwrap();

        let backup = dir.path().join("backup/2024/01/03/abcdEFGH_20240103000000.png");
        let edited = apply_crop(&original, &crop(0.0, 0.0, 0.0, 50.0)).unwrap();
        let committed =
            commit_edit(&source, &[backup.clone()], &edited, ImageFormat::Png).unwrap();

        assert_eq!((committed.width, committed.height), (20, 20));
        assert_eq!(committed.backup, backup);
        assert_eq!(std::fs::read(&backup).unwrap(), original_bytes);
        assert_eq!(
            committed.size_bytes,
            std::fs::metadata(&source).unwrap().len()
        );
        assert_eq!(image::open(&source).unwrap().dimensions(), (20, 20));
        assert!(!temp_sibling(&source).exists());
    }

    #[test]
    fn test_commit_edit_jpeg_drops_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.jpg");
        DynamicImage::new_rgb8(8, 8)
            .save_with_format(&source, ImageFormat::Jpeg)
            .unwrap();
        let edited = DynamicImage::new_rgba8(4, 4);
        let backup = dir.path().join("b/a_1.jpg");
        commit_edit(&source, &[backup], &edited, ImageFormat::Jpeg).unwrap();
        assert_eq!(image::open(&source).unwrap().dimensions(), (4, 4));
    }

    #[test]
    fn test_commit_edit_never_overwrites_backup() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.png");
        let original = DynamicImage::new_rgb8(40, 20);
        original.save_with_format(&source, ImageFormat::Png).unwrap();
        let original_bytes = std::fs::read(&source).unwrap();

        let candidates = vec![dir.path().join("b/a_t.png"), dir.path().join("b/a_t_1.png")];
        let half = apply_crop(&original, &crop(0.0, 0.0, 0.0, 50.0)).unwrap();
        let first = commit_edit(&source, &candidates, &half, ImageFormat::Png).unwrap();
        let after_first = std::fs::read(&source).unwrap();
        let quarter = apply_crop(&half, &crop(0.0, 0.0, 0.0, 50.0)).unwrap();
        let second = commit_edit(&source, &candidates, &quarter, ImageFormat::Png).unwrap();

        assert_eq!(first.backup, candidates[0]);
        assert_eq!(second.backup, candidates[1]);
        assert_eq!(std::fs::read(&candidates[0]).unwrap(), original_bytes);
        assert_eq!(std::fs::read(&candidates[1]).unwrap(), after_first);

        // Every candidate taken: the edit is refused and the file kept.
        let err = commit_edit(&source, &candidates, &half, ImageFormat::Png).unwrap_err();
        assert!(matches!(err, PixvaultError::Storage { .. }));
        assert_eq!(image::open(&source).unwrap().dimensions(), (10, 20));
    }
}
