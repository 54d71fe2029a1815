/// Scale `(width, height)` down to fit inside `(max_width, max_height)`,
/// preserving the aspect ratio.
///
/// Inputs that already fit are returned unchanged. Otherwise the axis that is
/// proportionally further over its bound is clamped to that bound and the
/// other axis is derived from the aspect ratio. Width wins ties.
pub fn fit_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let aspect = width as f64 / height.max(1) as f64;
    let width_ratio = width as f64 / max_width.max(1) as f64;
    let height_ratio = height as f64 / max_height.max(1) as f64;

    if width_ratio >= height_ratio {
        let h = (max_width as f64 / aspect).round() as u32;
        (max_width, h.clamp(1, max_height.max(1)))
    } else {
        let w = (max_height as f64 * aspect).round() as u32;
        (w.clamp(1, max_width.max(1)), max_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratio_millis(w: u32, h: u32) -> i64 {
        (w as f64 / h as f64 * 1000.0).round() as i64
    }

    #[test]
    fn test_fitting_input_is_unchanged() {
        for &(w, h) in &[(1, 1), (600, 800), (1200, 1600), (1200, 1), (5, 1600)] {
            assert_eq!(fit_dimensions(w, h, 1200, 1600), (w, h));
        }
    }

    #[test]
    fn test_width_bound_dominates() {
        // 3000/1200 = 2.5 vs 2000/1600 = 1.25
        assert_eq!(fit_dimensions(3000, 2000, 1200, 1600), (1200, 800));
    }

    #[test]
    fn test_height_bound_dominates() {
        // 1000/1200 < 4000/1600
        assert_eq!(fit_dimensions(1000, 4000, 1200, 1600), (400, 1600));
    }

    #[test]
    fn test_scaled_output_preserves_aspect_and_bounds() {
        let cases = [
            (3000, 4000),
            (1280, 900),
            (2400, 3200),
            (1920, 1080),
            (1280, 2560),
            (5000, 5000),
            (1201, 1601),
            (4000, 3000),
        ];
        for &(w, h) in &cases {
            let (nw, nh) = fit_dimensions(w, h, 1200, 1600);
            assert!(nw <= 1200 && nh <= 1600, "{}x{} -> {}x{}", w, h, nw, nh);
            let diff = (ratio_millis(nw, nh) - ratio_millis(w, h)).abs();
            assert!(diff <= 1, "aspect drifted for {}x{} -> {}x{}", w, h, nw, nh);
        }
    }

    #[test]
    fn test_scenario_capture_size() {
        assert_eq!(fit_dimensions(3000, 4000, 1200, 1600), (1200, 1600));
        assert_eq!(fit_dimensions(1280, 2000, 1200, 1600), (1024, 1600));
    }

    #[test]
    fn test_extreme_aspect_never_collapses_to_zero() {
        let (w, h) = fit_dimensions(100_000, 10, 1200, 1600);
        assert_eq!(w, 1200);
        assert!(h >= 1);
    }
}
