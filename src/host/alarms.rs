use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use super::AlarmScheduler;
use crate::info;

#[derive(Debug, Clone)]
struct Alarm {
    period: Duration,
    next_fire: Instant,
}

/// In-process periodic alarms with minute granularity, polled by the main loop.
#[derive(Debug, Default)]
pub struct LocalAlarms {
    alarms: HashMap<String, Alarm>,
}

impl LocalAlarms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_at(&mut self, name: &str, period_minutes: u64, now: Instant) {
        let period = Duration::from_secs(period_minutes.max(1).saturating_mul(60));
        self.alarms.insert(
            name.to_string(),
            Alarm { period, next_fire: now + period },
        );
        info!("[ALARMS] '{}' set to every {} minute(s)", name, period_minutes.max(1));
    }

    #[cfg(test)]
    pub fn period_minutes(&self, name: &str) -> Option<u64> {
        self.alarms.get(name).map(|a| a.period.as_secs() / 60)
    }

    /// Names of alarms whose time has come. Each fires at most once per call;
    /// an alarm that fell several periods behind is rescheduled from `now`.
    pub fn due(&mut self, now: Instant) -> Vec<String> {
        let mut fired = Vec::new();
        for (name, alarm) in self.alarms.iter_mut() {
            if now < alarm.next_fire {
                continue;
            }
            fired.push(name.clone());
            alarm.next_fire += alarm.period;
            if alarm.next_fire <= now {
                alarm.next_fire = now + alarm.period;
            }
        }
        fired.sort();
        fired
    }
}

impl AlarmScheduler for LocalAlarms {
    fn create(&mut self, name: &str, period_minutes: u64) {
        self.create_at(name, period_minutes, Instant::now());
    }
}
