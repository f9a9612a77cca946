/// Next position in a rotation of `length` items. Wraps to 0, and an empty
/// rotation always yields 0.
pub fn next_index(current: usize, length: usize) -> usize {
    if length == 0 {
        return 0;
    }
    (current % length + 1) % length
}
