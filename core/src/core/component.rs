/// Anything that advances by discrete clock edges (schedulers, channels, whole rigs)
pub trait Component {
    /// Advance one clock edge.
    /// Returns true if a "significant event" occurred (e.g., a slot delivered data).
    fn tick(&mut self) -> bool;

    /// Clock edges elapsed since construction or the last reset.
    fn cycles(&self) -> u64;
}
