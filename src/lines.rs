use crate::index_to_u32;

/// Maps byte offsets in a source file to 1-based line numbers.
#[derive(Debug)]
pub(crate) struct LineResolver {
    lines: Vec<usize>,
    len: usize,
}

impl LineResolver {
    pub fn new(source_code: &str) -> Self {
        let lines = source_code
            .match_indices('\n')
            .map(|(index, _)| index + 1)
            .collect();
        LineResolver {
            lines,
            len: source_code.len(),
        }
    }

    pub fn resolve(&self, offset: usize) -> u32 {
        match self.lines.binary_search(&offset) {
            Ok(index) => index_to_u32(index + 2),
            Err(index) => index_to_u32(index + 1),
        }
    }

    /// The line on which the source code ends.
    pub fn last_line(&self) -> u32 {
        self.resolve(self.len)
    }
}

#[test]
fn resolve_line_number() {
    let resolver = LineResolver::new("hello\nworld\nfoo");

    assert_eq!(resolver.resolve(0), 1);
    assert_eq!(resolver.resolve(4), 1);
    assert_eq!(resolver.resolve(5), 1);
    assert_eq!(resolver.resolve(6), 2);
    assert_eq!(resolver.resolve(7), 2);
    assert_eq!(resolver.resolve(11), 2);
    assert_eq!(resolver.resolve(12), 3);
    assert_eq!(resolver.resolve(14), 3);
    assert_eq!(resolver.last_line(), 3);
}

#[test]
fn trailing_newline_starts_new_line() {
    let resolver = LineResolver::new("a\n");

    assert_eq!(resolver.resolve(0), 1);
    assert_eq!(resolver.last_line(), 2);
}
