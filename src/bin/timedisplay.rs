//! Formats a `time::Duration` as `HHh MMm SS.mmms`, as printed at the end of
//! a run.

pub fn pretty_print_duration(duration: time::Duration) -> String {
    let total_ms = duration.num_milliseconds().max(0);

    let hours = total_ms / 3_600_000;
    let minutes = (total_ms / 60_000) % 60;
    let seconds = (total_ms / 1000) % 60;
    let millis = total_ms % 1000;

    if hours > 0 {
        format!("{}h {}m {}.{:03}s", hours, minutes, seconds, millis)
    } else if minutes > 0 {
        format!("{}m {}.{:03}s", minutes, seconds, millis)
    } else {
        format!("{}.{:03}s", seconds, millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_sub_minute_durations() {
        let d = time::Duration::milliseconds(1500);
        assert_eq!(pretty_print_duration(d), "1.500s");
    }

    #[test]
    fn formats_hour_scale_durations() {
        let d = time::Duration::milliseconds(3_661_250);
        assert_eq!(pretty_print_duration(d), "1h 1m 1.250s");
    }
}
