//! Chrome DevTools Protocol rasterizer

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine as Base64Engine;
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use log::debug;

use crate::config::CaptureOptions;
use crate::rendering::images::IMAGE_LOAD_TIMEOUT;
use crate::rendering::{codec, fit_canvas, Rasterizer};
use crate::rewrite::Placeholder;
use crate::screenshot::ScreenshotData;
use crate::surface::Container;
use crate::{Error, Result};

const CONTAINER_SELECTOR: &str = "#mailpreview-capture";

/// Renders containers in a headless Chrome tab
///
/// All captures share one tab and run one at a time.
pub struct CdpRasterizer {
    // keeps the browser process alive as long as the tab is in use
    _browser: Browser,
    tab: Arc<Tab>,
    busy: Arc<Mutex<()>>,
}

impl CdpRasterizer {
    pub fn new() -> Result<Self> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((1280, 2000)))
            .build()
            .map_err(|e| Error::CdpError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::CdpError(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::CdpError(format!("Failed to create tab: {}", e)))?;

        Ok(Self {
            _browser: browser,
            tab,
            busy: Arc::new(Mutex::new(())),
        })
    }
}

/// Script marking every image anonymous-CORS and swapping images that fail
/// or stall past the watchdog for the placeholder block.
fn image_watchdog_script(timeout_ms: u64) -> String {
    let template = Placeholder {
        width: 0,
        height: 0,
    }
    .to_html();
    let template_json = serde_json::to_string(&template).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        r#"(async function() {{
            const template = {template};
            const root = document.querySelector('{selector}');
            const images = Array.from(root ? root.querySelectorAll('img') : []);
            const swap = (img) => {{
                const w = img.getAttribute('width') || 200;
                const h = img.getAttribute('height') || 150;
                const holder = document.createElement('div');
                holder.innerHTML = template.replace('width: 0px', 'width: ' + parseInt(w) + 'px').replace('height: 0px', 'height: ' + parseInt(h) + 'px');
                if (img.parentNode) img.parentNode.replaceChild(holder.firstChild, img);
            }};
            await Promise.all(images.map((img) => new Promise((resolve) => {{
                img.crossOrigin = 'anonymous';
                if (img.complete && img.naturalWidth > 0) return resolve();
                const timer = setTimeout(() => {{ swap(img); resolve(); }}, {timeout});
                img.onload = () => {{ clearTimeout(timer); resolve(); }};
                img.onerror = () => {{ clearTimeout(timer); swap(img); resolve(); }};
                if (img.src) img.src = img.src;
            }})));
            return images.length;
        }})()"#,
        template = template_json,
        selector = CONTAINER_SELECTOR,
        timeout = timeout_ms
    )
}

fn capture_blocking(tab: &Tab, container: &Container, options: &CaptureOptions) -> Result<Vec<u8>> {
    // the tab is a dedicated page, so the container can sit in view
    let mut visible = container.clone();
    visible.style.left = 0;
    let page = visible.to_page_html();
    let url = format!(
        "data:text/html;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(page.as_bytes())
    );

    tab.navigate_to(&url)
        .map_err(|e| Error::RenderError(format!("Navigation failed: {}", e)))?;
    tab.wait_until_navigated()
        .map_err(|e| Error::RenderError(format!("Wait for navigation failed: {}", e)))?;

    let script = image_watchdog_script(IMAGE_LOAD_TIMEOUT.as_millis() as u64);
    tab.evaluate(&script, true)
        .map_err(|e| Error::RenderError(format!("Image preparation failed: {}", e)))?;

    let element = tab
        .wait_for_element(CONTAINER_SELECTOR)
        .map_err(|e| Error::RenderError(format!("Container not found: {}", e)))?;
    let mut clip = element
        .get_box_model()
        .map_err(|e| Error::RenderError(format!("Failed to measure container: {}", e)))?
        .border_viewport();
    clip.scale = options.scale as f64;

    tab.capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, Some(clip), true)
        .map_err(|e| Error::RenderError(format!("Screenshot failed: {}", e)))
}

#[async_trait]
impl Rasterizer for CdpRasterizer {
    async fn rasterize(&self, container: &Container, options: &CaptureOptions) -> Result<ScreenshotData> {
        options.check()?;
        let tab = self.tab.clone();
        let busy = self.busy.clone();
        let container = container.clone();
        let opts = options.clone();
        let png = tokio::task::spawn_blocking(move || {
            let _guard = busy.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            capture_blocking(&tab, &container, &opts)
        })
            .await
            .map_err(|e| Error::CdpError(format!("capture task failed: {}", e)))??;

        let canvas = fit_canvas(codec::decode(&png)?, options);
        let (width, height) = canvas.dimensions();
        debug!("CDP capture produced {}x{}", width, height);
        let bytes = codec::encode(&canvas, options.format, options.quality)?;
        Ok(ScreenshotData::from_encoded(&bytes, options.format, width, height))
    }
}
