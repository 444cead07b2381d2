// Frame <-> time conversions
// Progress display and seek targets both go through here so they always agree.

/// Elapsed play time in milliseconds after `frame` frames.
pub fn elapsed_ms(frame: u64, ms_per_frame: f64) -> f64 {
    frame as f64 * ms_per_frame
}

/// Index of the frame that contains `ms`.
///
/// Negative or NaN inputs and a non-positive frame duration map to frame 0.
pub fn frame_for_ms(ms: f64, ms_per_frame: f64) -> u64 {
    if !(ms_per_frame > 0.0) || !(ms > 0.0) {
        return 0;
    }
    (ms / ms_per_frame).floor() as u64
}

/// Format a duration as `mm:ss` for queue rows and the console view.
pub fn format_duration(ms: f64) -> String {
    let total_secs = if ms.is_finite() && ms > 0.0 {
        (ms / 1000.0) as u64
    } else {
        0
    };
    let clamped = total_secs.min(99 * 60 + 59); // Cap at 99:59
    format!("{:02}:{:02}", clamped / 60, clamped % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_for_ms_floors() {
        assert_eq!(frame_for_ms(1300.0, 26.0), 50);
        assert_eq!(frame_for_ms(1299.9, 26.0), 49);
        assert_eq!(frame_for_ms(0.0, 26.0), 0);
    }

    #[test]
    fn test_frame_for_ms_rejects_bad_input() {
        assert_eq!(frame_for_ms(-5.0, 26.0), 0);
        assert_eq!(frame_for_ms(f64::NAN, 26.0), 0);
        assert_eq!(frame_for_ms(100.0, 0.0), 0);
    }

    #[test]
    fn test_seek_and_progress_agree() {
        let ms_per_frame = 26.122448979591837; // 1152 samples at 44.1 kHz
        for ms in [0.0, 1.0, 999.0, 61_234.5] {
            let frame = frame_for_ms(ms, ms_per_frame);
            let shown = elapsed_ms(frame, ms_per_frame);
            assert!(shown <= ms + 1e-9);
            assert!(ms - shown < ms_per_frame);
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "00:00");
        assert_eq!(format_duration(61_999.0), "01:01");
        assert_eq!(format_duration(10_000_000.0), "99:59");
        assert_eq!(format_duration(f64::NAN), "00:00");
    }
}
