/// Settings used when a camera is brought up
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Config {
    /// Device index, the camera node is `/dev/video{index}`.
    /// Default is `0`.
    pub index: usize,
    /// Requested frame width. The driver has the final say.
    /// Default is `640`.
    pub width: u32,
    /// Requested frame height. The driver has the final say.
    /// Default is `480`.
    pub height: u32,
    /// Number of buffers to request for streaming.
    /// Default is `4`.
    pub buffers: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            index: 0,
            width: 640,
            height: 480,
            buffers: 4,
        }
    }
}

impl Config {
    /// Default settings for the device with the given index
    ///
    /// # Example
    ///
    /// ```
    /// use webcam::Config;
    /// let config = Config::new(1).size(1280, 720).buffers(2);
    /// assert_eq!(config.index, 1);
    /// ```
    pub fn new(index: usize) -> Self {
        Config {
            index,
            ..Default::default()
        }
    }

    pub fn index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn buffers(mut self, count: u32) -> Self {
        self.buffers = count;
        self
    }
}
