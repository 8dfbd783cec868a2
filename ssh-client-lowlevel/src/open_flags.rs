use std::ops::{BitOr, BitOrAssign};

/// `pflags` of an sftp v3 open request.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub struct OpenFlags(u32);

impl OpenFlags {
    /// `SSH_FXF_READ`
    pub const READ: OpenFlags = OpenFlags(0x0000_0001);
    /// `SSH_FXF_WRITE`
    pub const WRITE: OpenFlags = OpenFlags(0x0000_0002);
    /// `SSH_FXF_APPEND`
    pub const APPEND: OpenFlags = OpenFlags(0x0000_0004);
    /// `SSH_FXF_CREAT`
    pub const CREATE: OpenFlags = OpenFlags(0x0000_0008);
    /// `SSH_FXF_TRUNC`
    pub const TRUNCATE: OpenFlags = OpenFlags(0x0000_0010);
    /// `SSH_FXF_EXCL`
    pub const EXCLUSIVE: OpenFlags = OpenFlags(0x0000_0020);

    pub const fn empty() -> Self {
        OpenFlags(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        OpenFlags(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Return true if every flag of `other` is set.
    pub const fn contains(self, other: OpenFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for OpenFlags {
    type Output = OpenFlags;

    fn bitor(self, rhs: OpenFlags) -> OpenFlags {
        OpenFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for OpenFlags {
    fn bitor_assign(&mut self, rhs: OpenFlags) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine() {
        let mut flags = OpenFlags::READ | OpenFlags::WRITE;
        assert!(flags.contains(OpenFlags::READ));
        assert!(!flags.contains(OpenFlags::CREATE));

        flags |= OpenFlags::CREATE;
        assert_eq!(flags.bits(), 0x0b);
    }
}
