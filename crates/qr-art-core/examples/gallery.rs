//! Renders one art QR per style over its gradient and checks each scans back
//!
//! Usage: cargo run -p qr-art-core --example gallery -- [payload] [output_dir]

use anyhow::Context;
use qr_art_core::export::{suggested_filename, ExportKind};
use qr_art_core::{
    export, generate_plain, ArtStyle, Background, Color, Compositor, EncodingRequest, ExportFormat, Gradient,
    Palette, ScanVerifier,
};
use std::fs;
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    env_logger::builder().filter_level(log::LevelFilter::Info).init();

    let mut args = std::env::args().skip(1);
    let payload = args.next().unwrap_or_else(|| "https://example.com".to_string());
    let output_dir = PathBuf::from(args.next().unwrap_or_else(|| "gallery".to_string()));
    fs::create_dir_all(&output_dir).with_context(|| format!("creating {:?}", output_dir))?;

    let compositor = Compositor::default();
    let verifier = ScanVerifier::new();

    for style in ArtStyle::ALL {
        let (dark, light) = style.module_colors();
        // Фон в тон стилю: от светлого цвета модулей к тёмному
        let gradient = Gradient::linear(light.with_opacity(1.0), dark, 135.0);
        let background = Background::from_gradient(&gradient, compositor.spec().canvas_size);

        let request = EncodingRequest::styled(payload.as_str(), style);
        let result = compositor.art(&request, Some(&background))?;
        let path = output_dir.join(format!("{}.png", style.id()));
        fs::write(&path, export(&result, ExportFormat::Png)?)?;

        let scanned = verifier
            .verify(&result, &payload)
            .with_context(|| format!("{} output does not scan", style.id()))?;
        println!("{:<11} v{:?} via {} -> {:?}", style.id(), scanned.version, scanned.decoder, path);
    }

    for palette in [Palette::Classic, Palette::Ocean, Palette::Sunset] {
        let result = generate_plain(&EncodingRequest::plain(payload.as_str(), palette), 300)?;
        let name = format!("{}-{}", palette.name(), suggested_filename(ExportKind::Plain, ExportFormat::Png));
        fs::write(output_dir.join(&name), export(&result, ExportFormat::Png)?)?;
        println!("{:<11} -> {}", palette.name(), name);
    }

    // Цвет заливки по умолчанию тоже должен читаться
    let bare = compositor.art(&EncodingRequest::art(payload.as_str()), None)?;
    verifier.verify(&bare, &payload)?;
    fs::write(
        output_dir.join(suggested_filename(ExportKind::Art, ExportFormat::Png)),
        export(&bare, ExportFormat::Png)?,
    )?;
    println!("fallback fill {} ok", Color::rgb(0x93, 0x33, 0xea));

    Ok(())
}
