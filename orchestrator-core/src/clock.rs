/// Abstracts "current time" so the same reconciliation loop can run against
/// a real clock or the Simulator's virtual one (spec §4.7, §9). Not present
/// in the teacher workspace in this shape; it is the standard Rust idiom for
/// swapping a wall-clock dependency for a deterministic one in tests and in
/// the Simulator driver.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// Wall-clock time as UNIX epoch seconds.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> f64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock before UNIX epoch")
            .as_secs_f64()
    }
}

/// A virtual clock that advances by a fixed `time_interval` per completed
/// cycle, mirroring `OrchestratorSimulation.time()`'s
/// `starting_time + cycle * time_interval`.
#[derive(Debug, Clone)]
pub struct VirtualClock {
    starting_time: f64,
    time_interval: f64,
    cycle: std::sync::atomic::AtomicU64,
}

impl VirtualClock {
    pub fn new(starting_time: f64, time_interval: f64) -> Self {
        Self {
            starting_time,
            time_interval,
            cycle: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn advance_cycle(&self) {
        self.cycle
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn cycle(&self) -> u64 {
        self.cycle.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> f64 {
        self.starting_time + (self.cycle() as f64) * self.time_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_clock_advances_by_time_interval_per_cycle() {
        let clock = VirtualClock::new(1000.0, 100.0);
        assert_eq!(clock.now(), 1000.0);
        clock.advance_cycle();
        assert_eq!(clock.now(), 1100.0);
        clock.advance_cycle();
        assert_eq!(clock.now(), 1200.0);
    }
}
