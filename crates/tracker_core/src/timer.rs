/// Whole-second wall clock for a tracking session.
///
/// The tick source lives outside the core; each delivered tick advances the
/// counter while the timer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElapsedTimer {
    running: bool,
    seconds: u64,
}

impl ElapsedTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restarts from zero.
    pub fn start(&mut self) {
        self.running = true;
        self.seconds = 0;
    }

    /// Idempotent; the counter keeps its value.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Returns whether the tick was counted.
    pub fn tick(&mut self) -> bool {
        if self.running {
            self.seconds += 1;
        }
        self.running
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.seconds
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_only_while_running() {
        let mut timer = ElapsedTimer::new();
        assert!(!timer.tick());
        timer.start();
        assert!(timer.tick());
        assert!(timer.tick());
        timer.stop();
        timer.stop();
        assert!(!timer.tick());
        assert_eq!(timer.elapsed_seconds(), 2);
    }

    #[test]
    fn start_resets_the_counter() {
        let mut timer = ElapsedTimer::new();
        timer.start();
        timer.tick();
        timer.start();
        assert_eq!(timer.elapsed_seconds(), 0);
        assert!(timer.is_running());
    }
}
