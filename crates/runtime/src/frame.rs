use foundation::time::Time;

/// Metadata for one executed render frame.
///
/// Skipped animation-frame callbacks never produce a `Frame`, so `index`
/// counts only frames that actually ran.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    /// 0-based executed frame index.
    pub index: u64,
    /// Time since the previous executed frame (seconds).
    pub dt_s: f64,
    /// Host clock at the callback that executed this frame.
    pub time: Time,
}

impl Frame {
    pub fn first(time: Time) -> Self {
        Self {
            index: 0,
            dt_s: 0.0,
            time,
        }
    }

    pub fn next(self, time: Time) -> Self {
        Self {
            index: self.index + 1,
            dt_s: time.since(self.time),
            time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Frame;
    use foundation::time::Time;

    #[test]
    fn first_frame_has_no_delta() {
        let f = Frame::first(Time(2.0));
        assert_eq!(f.index, 0);
        assert_eq!(f.dt_s, 0.0);
    }

    #[test]
    fn next_advances_index_and_time() {
        let f0 = Frame::first(Time(0.5));
        let f1 = f0.next(Time(0.75));
        assert_eq!(f1.index, 1);
        assert_eq!(f1.dt_s, 0.25);
        assert_eq!(f1.time, Time(0.75));
    }
}
