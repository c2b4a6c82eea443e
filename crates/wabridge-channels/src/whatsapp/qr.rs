//! QR code rendering for the pairing flow.

use base64::{engine::general_purpose::STANDARD, Engine};
use qrcode::{Color, EcLevel, QrCode};
use wabridge_core::error::BridgeError;

fn encode(qr_data: &str) -> Result<QrCode, BridgeError> {
    QrCode::with_error_correction_level(qr_data.as_bytes(), EcLevel::L)
        .map_err(|e| BridgeError::Render(format!("QR generation failed: {e}")))
}

/// Compact terminal rendering using Unicode half blocks (two module rows per line).
pub fn generate_qr_terminal(qr_data: &str) -> Result<String, BridgeError> {
    let code = encode(qr_data)?;
    let width = code.width();
    let colors = code.into_colors();
    let dark = |row: usize, col: usize| row < width && colors[row * width + col] == Color::Dark;

    let mut out = String::with_capacity((width + 1) * width.div_ceil(2) * 3);
    for row in (0..width).step_by(2) {
        for col in 0..width {
            out.push(match (dark(row, col), dark(row + 1, col)) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                (false, false) => ' ',
            });
        }
        out.push('\n');
    }
    Ok(out)
}

/// PNG bytes, 10px per module with a two-module white border.
pub fn generate_qr_image(qr_data: &str) -> Result<Vec<u8>, BridgeError> {
    use image::{ImageBuffer, Luma};

    const MODULE: u32 = 10;
    const QUIET: u32 = 2;

    let code = encode(qr_data)?;
    let modules = code.width() as u32;
    let size = (modules + QUIET * 2) * MODULE;

    let img = ImageBuffer::from_fn(size, size, |x, y| {
        let (cx, cy) = (x / MODULE, y / MODULE);
        if cx < QUIET || cy < QUIET || cx - QUIET >= modules || cy - QUIET >= modules {
            return Luma([255u8]);
        }
        match code[((cx - QUIET) as usize, (cy - QUIET) as usize)] {
            Color::Dark => Luma([0u8]),
            Color::Light => Luma([255u8]),
        }
    });

    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| BridgeError::Render(format!("PNG encoding failed: {e}")))?;
    Ok(buf.into_inner())
}

/// `data:image/png;base64,...` URI for embedding in an `<img>` tag.
pub fn qr_data_uri(qr_data: &str) -> Result<String, BridgeError> {
    let png = generate_qr_image(qr_data)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}
