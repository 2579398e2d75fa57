use std::fs;
use std::path::Path;

use super::Document;
use crate::Error;

/// Splits a document into chunks of at most `chunk_size` characters.
///
/// Paragraphs (separated by blank lines) are packed into chunks joined by
/// a blank line. A paragraph longer than `chunk_size` is broken between
/// words, and a single word longer than that between characters.
pub fn split_text(text: &str, chunk_size: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = vec![];
    let mut current = String::new();
    let mut current_len = 0;

    for piece in paragraphs(text)
        .into_iter()
        .flat_map(|para| split_long(&para, chunk_size))
    {
        let piece_len = piece.chars().count();
        if current.is_empty() {
            current = piece;
            current_len = piece_len;
        } else if current_len + 2 + piece_len <= chunk_size {
            current.push_str("\n\n");
            current.push_str(&piece);
            current_len += 2 + piece_len;
        } else {
            chunks.push(std::mem::replace(&mut current, piece));
            current_len = piece_len;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = vec![];
    let mut lines: Vec<&str> = vec![];
    for line in text.lines() {
        if line.trim().is_empty() {
            if !lines.is_empty() {
                paragraphs.push(lines.join("\n"));
                lines.clear();
            }
        } else {
            lines.push(line.trim_end());
        }
    }
    if !lines.is_empty() {
        paragraphs.push(lines.join("\n"));
    }
    paragraphs
}

fn split_long(paragraph: &str, chunk_size: usize) -> Vec<String> {
    if paragraph.chars().count() <= chunk_size {
        return vec![paragraph.to_owned()];
    }

    let mut pieces = vec![];
    let mut current = String::new();
    let mut current_len = 0;
    for word in paragraph.split_whitespace() {
        let mut word_chars: Vec<char> = word.chars().collect();
        // Words that can't fit anywhere are cut first.
        while word_chars.len() > chunk_size {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word_chars.split_off(chunk_size);
            pieces.push(word_chars.into_iter().collect());
            word_chars = rest;
        }
        if word_chars.is_empty() {
            continue;
        }

        let word_len = word_chars.len();
        if current.is_empty() {
            current = word_chars.into_iter().collect();
            current_len = word_len;
        } else if current_len + 1 + word_len <= chunk_size {
            current.push(' ');
            current.extend(word_chars);
            current_len += 1 + word_len;
        } else {
            pieces.push(std::mem::replace(
                &mut current,
                word_chars.into_iter().collect(),
            ));
            current_len = word_len;
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Loads every `.txt` and `.md` file in `dir` and splits it into
/// documents, in file name order. Subdirectories are skipped.
pub fn load_documents(
    dir: impl AsRef<Path>,
    chunk_size: usize,
) -> Result<Vec<Document>, Error> {
    let dir = dir.as_ref();
    let mut paths = vec![];
    for entry in fs::read_dir(dir).map_err(|err| Error::io(dir, err))? {
        let path = entry.map_err(|err| Error::io(dir, err))?.path();
        let is_text = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext, "txt" | "md"));
        if is_text && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut documents = vec![];
    for path in paths {
        let text =
            fs::read_to_string(&path).map_err(|err| Error::io(&path, err))?;
        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        let chunks = split_text(&text, chunk_size);
        debug!("{} split into {} chunks", path.display(), chunks.len());
        documents.extend(chunks.into_iter().map(|page_content| Document {
            page_content,
            source: source.clone(),
        }));
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANUAL: &str = "\
AC error codes

E1: the indoor sensor failed.
Check the sensor cable.


E2: the outdoor fan is blocked.
";

    #[test]
    fn test_packs_paragraphs() {
        let chunks = split_text(MANUAL, 1000);
        assert_eq!(
            chunks,
            ["AC error codes\n\nE1: the indoor sensor failed.\nCheck the sensor cable.\n\nE2: the outdoor fan is blocked."]
        );

        let chunks = split_text(MANUAL, 60);
        assert_eq!(
            chunks,
            [
                "AC error codes",
                "E1: the indoor sensor failed.\nCheck the sensor cable.",
                "E2: the outdoor fan is blocked.",
            ]
        );
    }

    #[test]
    fn test_long_paragraphs() {
        let chunks = split_text("clean the filter every month", 12);
        assert_eq!(chunks, ["clean the", "filter every", "month"]);

        let chunks = split_text("abcdefghij", 4);
        assert_eq!(chunks, ["abcd", "efgh", "ij"]);

        for chunk in split_text("Entlüftungsventil öffnen und schließen", 10) {
            assert!(chunk.chars().count() <= 10);
        }
    }

    #[test]
    fn test_blank_input() {
        assert!(split_text("", 100).is_empty());
        assert!(split_text("\n  \n\n", 100).is_empty());
    }

    #[test]
    fn test_load_documents() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b_fridge.md"), "Defrost monthly.").unwrap();
        fs::write(dir.path().join("a_ac.txt"), "E1: check sensor.\n\nE2: fan.")
            .unwrap();
        fs::write(dir.path().join("notes.pdf"), "binary").unwrap();
        fs::create_dir(dir.path().join("nested.txt")).unwrap();

        let docs = load_documents(dir.path(), 20).unwrap();
        let summary: Vec<_> = docs
            .iter()
            .map(|doc| (doc.source.as_deref().unwrap(), doc.page_content.as_str()))
            .collect();
        assert_eq!(
            summary,
            [
                ("a_ac.txt", "E1: check sensor."),
                ("a_ac.txt", "E2: fan."),
                ("b_fridge.md", "Defrost monthly."),
            ]
        );

        let err = load_documents(dir.path().join("missing"), 10).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
