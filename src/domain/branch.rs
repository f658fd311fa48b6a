use std::fmt;

/// Long-lived branch of one major version line, named `vN.x`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReleaseBranch {
    pub major: u64,
}

impl ReleaseBranch {
    pub fn new(major: u64) -> Self {
        ReleaseBranch { major }
    }

    /// Recognize a release branch name
    pub fn parse(name: &str) -> Option<Self> {
        name.strip_prefix('v')
            .and_then(|rest| rest.strip_suffix(".x"))
            .filter(|major| !major.is_empty() && (major == &"0" || !major.starts_with('0')))
            .and_then(|major| major.parse::<u64>().ok())
            .map(ReleaseBranch::new)
    }

    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ReleaseBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.x", self.major)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_branch_name() {
        assert_eq!(ReleaseBranch::new(3).name(), "v3.x");
    }

    #[test]
    fn test_release_branch_parse() {
        assert_eq!(ReleaseBranch::parse("v2.x"), Some(ReleaseBranch::new(2)));
        assert_eq!(ReleaseBranch::parse("v0.x"), Some(ReleaseBranch::new(0)));
    }

    #[test]
    fn test_other_branches_are_not_release_branches() {
        assert_eq!(ReleaseBranch::parse("main"), None);
        assert_eq!(ReleaseBranch::parse("v2"), None);
        assert_eq!(ReleaseBranch::parse("v02.x"), None);
        assert_eq!(ReleaseBranch::parse("vx.x"), None);
    }
}
