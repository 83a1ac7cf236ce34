//! QR challenge rendering.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use qrcode::render::svg;
use qrcode::QrCode;

use crate::error::BridgeError;
use crate::Result;

/// Render a raw QR challenge as an SVG image data URL.
///
/// The challenge is opaque to the bridge; subscribers receive a URL they
/// can drop into an `<img>` tag.
pub fn challenge_to_data_url(challenge: &str) -> Result<String> {
    let code =
        QrCode::new(challenge.as_bytes()).map_err(|e| BridgeError::QrRender(e.to_string()))?;
    let image = code
        .render::<svg::Color>()
        .min_dimensions(256, 256)
        .build();
    Ok(format!("data:image/svg+xml;base64,{}", STANDARD.encode(image)))
}
