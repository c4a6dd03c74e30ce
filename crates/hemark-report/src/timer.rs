//! Wall and CPU time measurement.

use std::time::Instant;

/// Cumulative process CPU time (user + system) in nanoseconds.
pub fn cpu_time_ns() -> u64 {
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    // getrusage(RUSAGE_SELF) writes into the struct we own and cannot fail
    // with these arguments.
    let ret = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if ret != 0 {
        return 0;
    }
    let to_ns = |tv: libc::timeval| tv.tv_sec as u64 * 1_000_000_000 + tv.tv_usec as u64 * 1_000;
    to_ns(usage.ru_utime) + to_ns(usage.ru_stime)
}

/// Measures one region of wall and CPU time.
pub struct Timer {
    wall: Instant,
    cpu_start: u64,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            wall: Instant::now(),
            cpu_start: cpu_time_ns(),
        }
    }

    /// Elapsed (wall_ns, cpu_ns) since start.
    pub fn stop(&self) -> (u64, u64) {
        let wall_ns = self.wall.elapsed().as_nanos() as u64;
        let cpu_ns = cpu_time_ns().saturating_sub(self.cpu_start);
        (wall_ns, cpu_ns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_measures_something() {
        let timer = Timer::start();
        let mut acc = 0u64;
        for i in 0..200_000u64 {
            acc = acc.wrapping_add(i * i);
        }
        std::hint::black_box(acc);
        let (wall_ns, _cpu_ns) = timer.stop();
        assert!(wall_ns > 0);
    }

    #[test]
    fn cpu_time_is_monotonic() {
        let a = cpu_time_ns();
        let mut acc = 1u64;
        for i in 1..100_000u64 {
            acc = acc.wrapping_mul(i | 1);
        }
        std::hint::black_box(acc);
        let b = cpu_time_ns();
        assert!(b >= a);
    }
}
