use std::fs;
use std::path::{Path, PathBuf};

/// Video device node found on the system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    path: PathBuf,
}

impl Node {
    /// Returns a node for the given path
    ///
    /// # Arguments
    ///
    /// * `path` - Node path (usually a character device or sysfs entry)
    ///
    /// # Example
    ///
    /// ```
    /// use webcam::context::Node;
    /// let node = Node::new("/dev/video0");
    /// assert_eq!(node.index(), Some(0));
    /// ```
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Node {
            path: PathBuf::from(path.as_ref()),
        }
    }

    /// Returns the absolute path of the device node
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the index of the device node
    pub fn index(&self) -> Option<usize> {
        let file_name = self.path.file_name()?.to_str()?;
        let digits = file_name.strip_prefix("video")?;
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        digits.parse::<usize>().ok()
    }

    /// Returns name of the device by parsing its sysfs entry
    pub fn name(&self) -> Option<String> {
        let index = self.index()?;
        let path = format!("{}{}{}", "/sys/class/video4linux/video", index, "/name");
        fs::read_to_string(path)
            .ok()
            .map(|name| name.trim().to_string())
    }
}

/// Returns a list of devices currently known to the system, ordered by index
///
/// # Example
///
/// ```
/// use webcam::context;
/// for dev in context::enum_devices() {
///     println!("{:?}: {:?}", dev.index(), dev.name());
/// }
/// ```
pub fn enum_devices() -> Vec<Node> {
    let mut devices = Vec::new();

    let entries = match fs::read_dir("/dev") {
        Ok(entries) => entries,
        Err(_) => return devices,
    };
    for dentry in entries.flatten() {
        let node = Node::new(dentry.path());
        if node.index().is_some() {
            devices.push(node);
        }
    }

    devices.sort_by_key(|node| node.index());
    devices
}
