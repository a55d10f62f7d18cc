/// Frame counter for a strip of images. Each image is held for
/// `frame_duration` steps.
#[derive(Clone, Debug, PartialEq)]
pub struct Animation {
    frame_count: usize,
    frame_duration: usize,
    looping: bool,
    frame: usize,
    done: bool,
}

impl Animation {
    pub fn new(frame_count: usize, frame_duration: usize, looping: bool) -> Self {
        Self {
            frame_count: frame_count.max(1),
            frame_duration: frame_duration.max(1),
            looping,
            frame: 0,
            done: false,
        }
    }

    pub fn starting_at(mut self, frame: usize) -> Self {
        self.frame = frame.min(self.total_steps() - 1);
        self
    }

    fn total_steps(&self) -> usize {
        self.frame_count * self.frame_duration
    }

    pub fn update(&mut self) {
        let total = self.total_steps();
        if self.looping {
            self.frame = (self.frame + 1) % total;
        } else {
            self.frame = (self.frame + 1).min(total - 1);
            if self.frame >= total - 1 {
                self.done = true;
            }
        }
    }

    pub fn image_index(&self) -> usize {
        self.frame / self.frame_duration
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Never true for looping animations.
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn restart(&mut self) {
        self.frame = 0;
        self.done = false;
    }
}
