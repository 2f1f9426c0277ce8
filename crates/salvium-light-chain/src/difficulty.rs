//! LWMA v2 difficulty.
//!
//! Linearly-weighted moving average over the last `DIFFICULTY_WINDOW_V2`
//! solve times, with the reference implementation's clamping and 998/1000
//! adjustment. Fixed-point in i128 to avoid floats.
//!
//! Reference: salvium/src/cryptonote_basic/difficulty.cpp (LWMA-2)

/// Window size for the v2 algorithm.
pub const DIFFICULTY_WINDOW_V2: usize = 70;

/// Next difficulty from a window of timestamps and cumulative difficulties
/// (oldest first, at most `DIFFICULTY_WINDOW_V2 + 1` entries are used).
pub fn next_difficulty_v2(
    timestamps: &[u64],
    cumulative_difficulties: &[u128],
    target_seconds: u64,
) -> u128 {
    debug_assert_eq!(timestamps.len(), cumulative_difficulties.len());

    let t = target_seconds as i128;
    let mut n = DIFFICULTY_WINDOW_V2;

    let mut ts = timestamps;
    let mut cd = cumulative_difficulties;
    if ts.len() > n + 1 {
        ts = &ts[..n + 1];
        cd = &cd[..n + 1];
    }

    let count = ts.len();
    // Bootstrapping: difficulty 1 for the first five blocks.
    if count < 6 {
        return 1;
    }
    if count < n + 1 {
        n = count - 1;
    }

    let n_big = n as i128;
    let k = n_big * (n_big + 1) / 2;

    const SCALE: i128 = 1_000_000;
    const ADJUST_NUM: i128 = 998;
    const ADJUST_DEN: i128 = 1000;

    let mut weighted_solve_time: i128 = 0;
    let mut total_difficulty: u128 = 0;

    for i in 1..=n {
        let mut solve_time = ts[i] as i128 - ts[i - 1] as i128;
        let max_st = 7 * t;
        solve_time = solve_time.clamp(-max_st, max_st);

        weighted_solve_time += solve_time * i as i128;
        total_difficulty += cd[i] - cd[i - 1];
    }

    let lwma_scaled = (weighted_solve_time * SCALE / k).max(t * SCALE / 20);

    let next = total_difficulty as i128 * t * ADJUST_NUM * SCALE
        / (n_big * ADJUST_DEN * lwma_scaled);
    next.max(1) as u128
}
