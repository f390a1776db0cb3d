pub mod env;
pub mod retry;
pub mod tracing;

/// Compares two secrets without short-circuiting on the first mismatched byte, so the time taken
/// does not leak how much of a guessed key was correct
pub fn constant_time_cmp(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let res = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes())
        .fold(0u8, |acc, (l, r)| {
            acc | (std::hint::black_box(*l) ^ std::hint::black_box(*r))
        });

    res == 0
}
