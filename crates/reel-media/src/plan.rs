//! Duration planning across sources.

/// Split `target` seconds across sources.
///
/// `available[i]` is how long source `i` can run; `None` means unbounded
/// (still images). Every source gets an equal share; share a short source
/// cannot fill is handed to the others. The result never exceeds a source's
/// available length, and it sums to `target` whenever the sources together
/// can cover it.
pub fn plan_segments(available: &[Option<f64>], target: f64) -> Vec<f64> {
    let mut planned = vec![0.0; available.len()];
    if available.is_empty() || target.is_nan() || target <= 0.0 {
        return planned;
    }

    let capacity: Vec<Option<f64>> = available
        .iter()
        .map(|a| a.map(|secs| if secs.is_finite() { secs.max(0.0) } else { 0.0 }))
        .collect();

    let mut open: Vec<usize> = (0..available.len()).collect();
    let mut remaining = target;

    while !open.is_empty() && remaining > 0.0 {
        let share = remaining / open.len() as f64;
        let (short, rest): (Vec<usize>, Vec<usize>) = open
            .iter()
            .copied()
            .partition(|&i| capacity[i].map(|c| c < share).unwrap_or(false));

        if short.is_empty() {
            for i in rest {
                planned[i] = share;
            }
            break;
        }

        for i in short {
            let take = capacity[i].unwrap_or(0.0);
            planned[i] = take;
            remaining -= take;
        }
        open = rest;
    }

    planned
}
