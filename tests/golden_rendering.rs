use std::fs;
use std::path::PathBuf;

use sha2::{Digest, Sha256};

use mailpreview::config::{CaptureOptions, Color};
use mailpreview::surface::{Container, ContainerStyle};
use mailpreview::SoftwareRasterizer;

fn golden_path(name: &str) -> PathBuf {
    let mut p = PathBuf::from("tests/goldens/expected");
    p.push(name);
    p
}

#[tokio::test]
async fn golden_raster_matches_fixture() {
    let page = fs::read_to_string("tests/goldens/pages/newsletter.html").expect("read fixture");
    let container = Container::new(ContainerStyle::email(Color::WHITE), page);
    let options = CaptureOptions {
        scale: 1.0,
        auto_resize: false,
        ..Default::default()
    };

    // offline, so the banner always renders as a placeholder
    let pixels = SoftwareRasterizer::offline()
        .render_pixels(&container, &options)
        .await
        .expect("render");
    // seven blocks stacked in the 600px content box plus 20px padding
    assert_eq!(pixels.dimensions(), (640, 299));
    let digest = hex::encode(Sha256::digest(pixels.as_raw()));

    let expected_path = golden_path("newsletter.sha256");
    if std::env::var("UPDATE_GOLDENS").is_ok() {
        fs::create_dir_all("tests/goldens/expected").ok();
        fs::write(&expected_path, &digest).expect("write golden");
        println!("Updated golden: {:?}", expected_path);
        return;
    }

    if !expected_path.exists() {
        println!(
            "No golden at {:?}; run with UPDATE_GOLDENS=1 to create it. Skipping.",
            expected_path
        );
        return;
    }

    let expected = fs::read_to_string(&expected_path).expect("unable to read golden");
    assert_eq!(digest, expected.trim());
}

#[tokio::test]
async fn rendering_is_deterministic() {
    let page = fs::read_to_string("tests/goldens/pages/newsletter.html").expect("read fixture");
    let container = Container::new(ContainerStyle::email(Color::WHITE), page);
    let options = CaptureOptions::default();
    let r = SoftwareRasterizer::offline();
    let a = r.render_pixels(&container, &options).await.unwrap();
    let b = r.render_pixels(&container, &options).await.unwrap();
    assert_eq!(a.dimensions(), b.dimensions());
    assert!(a.as_raw() == b.as_raw());
}
