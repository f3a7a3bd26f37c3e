//! Minimal enhancement applied before the second decode pass
//!
//! Only two steps: a linear min/max contrast stretch and Otsu's global
//! threshold. The output stays a luminance plane (0 or 255) so it can be fed
//! straight back into the symbol locator.

/// Stretch `gray` in place so its darkest pixel maps to 0 and its brightest to 255.
/// Flat images are left untouched.
pub fn stretch_contrast(gray: &mut [u8]) {
    let (min, max) = gray
        .iter()
        .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if max <= min {
        return;
    }
    let range = (max - min) as u32;
    for px in gray.iter_mut() {
        *px = (((*px - min) as u32 * 255) / range) as u8;
    }
}

/// Calculate Otsu's optimal threshold
pub fn otsu_threshold(gray: &[u8]) -> u8 {
    let mut histogram = [0u64; 256];
    for &pixel in gray {
        histogram[pixel as usize] += 1;
    }

    let total = gray.len() as f64;
    if total == 0.0 {
        return 128;
    }
    let total_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();

    // Running sums over the dark class; the light class is the remainder
    let mut dark_pixels = 0.0f64;
    let mut dark_sum = 0.0f64;
    let mut best_variance = 0.0f64;
    let mut best_threshold = 128u8;

    for threshold in 1..256usize {
        let count = histogram[threshold - 1] as f64;
        dark_pixels += count;
        dark_sum += (threshold - 1) as f64 * count;

        let light_pixels = total - dark_pixels;
        if dark_pixels == 0.0 || light_pixels == 0.0 {
            continue;
        }
        let dark_mean = dark_sum / dark_pixels;
        let light_mean = (total_sum - dark_sum) / light_pixels;
        let variance = (dark_pixels / total) * (light_pixels / total) * (dark_mean - light_mean).powi(2);

        if variance > best_variance {
            best_variance = variance;
            best_threshold = threshold as u8;
        }
    }

    best_threshold
}

/// Pixels below `threshold` become 0 (dark), the rest 255
pub fn threshold_in_place(gray: &mut [u8], threshold: u8) {
    for px in gray.iter_mut() {
        *px = if *px < threshold { 0 } else { 255 };
    }
}

/// Contrast stretch followed by Otsu binarization
pub fn enhance_for_decode(gray: &mut [u8]) {
    stretch_contrast(gray);
    let threshold = otsu_threshold(gray);
    threshold_in_place(gray, threshold);
}
