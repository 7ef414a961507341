use lanefind_core::GrayImage;

/// Binary mask with one `thickness`-wide line per entry of `curves`, each
/// following `x(y) = a*y^2 + b*y + c` over the full height.
pub fn mask_with_curves(
    width: usize,
    height: usize,
    curves: &[(f64, f64, f64)],
    thickness: usize,
) -> GrayImage {
    assert!(thickness > 0, "line thickness must be positive");
    let mut img = GrayImage::new(width, height);
    for y in 0..height {
        let yf = y as f64;
        for &(a, b, c) in curves {
            let x0 = (a * yf * yf + b * yf + c).round() as i64 - (thickness as i64 - 1) / 2;
            for dx in 0..thickness as i64 {
                let x = x0 + dx;
                if x >= 0 && (x as usize) < width {
                    img.set(x as usize, y, 255);
                }
            }
        }
    }
    img
}

/// Two straight vertical lines at `left_x` and `right_x`.
pub fn vertical_lines(width: usize, height: usize, left_x: usize, right_x: usize) -> GrayImage {
    mask_with_curves(
        width,
        height,
        &[(0.0, 0.0, left_x as f64), (0.0, 0.0, right_x as f64)],
        1,
    )
}
