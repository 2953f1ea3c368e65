//! Argument and stdin buffer collection before spawn.

/// Where written items go before the process exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectTarget {
    /// Items become command-line arguments.
    Arguments,
    /// Items are kept verbatim and later replayed into the child's stdin.
    Buffer,
}

/// Accumulates items until spawn.
#[derive(Debug)]
pub struct Collector {
    target: CollectTarget,
    args: Vec<String>,
    buffer: Vec<Vec<u8>>,
}

impl Collector {
    #[must_use]
    pub fn new(target: CollectTarget) -> Self {
        Self {
            target,
            args: Vec::new(),
            buffer: Vec::new(),
        }
    }

    /// Collect an item written into the channel.
    pub fn push(&mut self, item: Vec<u8>) {
        match self.target {
            CollectTarget::Arguments => self.push_arg(&item),
            CollectTarget::Buffer => self.buffer.push(item),
        }
    }

    /// Collect an item as an argument regardless of target. Empty items are
    /// dropped.
    pub fn push_arg(&mut self, item: &[u8]) {
        if let Some(arg) = stringify(item) {
            self.args.push(arg);
        }
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Take the collected arguments and buffered chunks, leaving both empty.
    pub fn drain(&mut self) -> (Vec<String>, Vec<Vec<u8>>) {
        (
            std::mem::take(&mut self.args),
            std::mem::take(&mut self.buffer),
        )
    }
}

/// Textual form of an item, or `None` if it is empty.
#[must_use]
pub fn stringify(item: &[u8]) -> Option<String> {
    if item.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(item).into_owned())
}
