use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

/**
 * Byte range inside one source file. Offsets refer to the file text before line splicing.
 *
 * `system_macro` is set on tokens spelled in the body of a macro defined in a system header;
 * their span is the one of the invocation.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub file: FileId,
    pub start: usize,
    pub end: usize,
    pub system_macro: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Node<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

impl Span {
    pub fn new(file: FileId, start: usize, end: usize) -> Self {
        Self {
            file,
            start,
            end,
            system_macro: false,
        }
    }

    pub fn with_system_macro(self, system_macro: bool) -> Self {
        Self {
            system_macro,
            ..self
        }
    }

    /**
     * Span used for diagnostics that are not tied to any source, e.g. command line macros.
     */
    pub fn none() -> Self {
        Self {
            file: FileId(u32::MAX),
            start: 0,
            end: 0,
            system_macro: false,
        }
    }

    pub fn is_none(&self) -> bool {
        self.file.0 == u32::MAX
    }

    /**
     * Smallest span covering both. Spans from different files keep `self`. The result comes
     * from a system macro only if both parts do.
     */
    pub fn join(self, other: Span) -> Span {
        if self.file != other.file {
            return self;
        }
        Span {
            file: self.file,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            system_macro: self.system_macro && other.system_macro,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

pub struct SourceFile {
    pub name: String,
    pub path: Option<PathBuf>,
    pub text: String,
    line_starts: Vec<usize>,
}

impl SourceFile {
    fn new(name: String, path: Option<PathBuf>, text: String) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self {
            name,
            path,
            text,
            line_starts,
        }
    }

    fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(l) => l,
            Err(l) => l - 1,
        };
        let start = self.line_starts[line];
        let column = self.text[start..offset.min(self.text.len())].chars().count();
        (line + 1, column + 1)
    }

    pub fn line_of(&self, offset: usize) -> usize {
        self.line_col(offset).0
    }
}

/**
 * All files read during a compilation: the main file, included files and builtin headers.
 */
pub struct SourceMap {
    files: Vec<SourceFile>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    pub fn add_file(&mut self, name: String, path: Option<PathBuf>, text: String) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.files.push(SourceFile::new(name, path, text));
        id
    }

    pub fn get(&self, id: FileId) -> &SourceFile {
        &self.files[id.0 as usize]
    }

    pub fn locate(&self, span: Span) -> Option<Location> {
        if span.is_none() {
            return None;
        }
        let file = self.files.get(span.file.0 as usize)?;
        let (line, column) = file.line_col(span.start);
        Some(Location {
            file: file.name.clone(),
            line,
            column,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_locate() {
        let mut sm = SourceMap::new();
        let id = sm.add_file("a.c".to_string(), None, "int x;\n  int y;\n".to_string());
        let loc = sm.locate(Span::new(id, 9, 12)).unwrap();
        assert_eq!(loc.to_string(), "a.c:2:3");
        assert_eq!(sm.locate(Span::none()), None);
    }

    #[test]
    fn test_join() {
        let a = Span::new(FileId(0), 4, 6);
        let b = Span::new(FileId(0), 1, 3);
        assert_eq!(a.join(b), Span::new(FileId(0), 1, 6));
        let c = Span::new(FileId(1), 0, 9);
        assert_eq!(a.join(c), a);

        let sys = Span::new(FileId(0), 8, 9).with_system_macro(true);
        assert!(!a.join(sys).system_macro);
        assert!(sys.join(sys.with_system_macro(true)).system_macro);
    }
}
