// vkscript
//
// Copyright (C) 2018 Intel Corporation
// Copyright 2023 Neil Roberts
//
// Permission is hereby granted, free of charge, to any person obtaining a
// copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice (including the next
// paragraph) shall be included in all copies or substantial portions of the
// Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.  IN NO EVENT SHALL
// THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

use crate::source;
use std::fs;
use std::io;
use std::io::BufRead;
use thiserror::Error;

/// The maximum number of token replacements that can be made on a
/// single line before assuming that the replacements loop forever.
const MAX_TOKEN_REPLACEMENTS: usize = 1000;

// The two kinds of buf readers that a stream can use. A boxed trait
// object would need to borrow the source string for the lifetime of
// the box so an enum is simpler.
#[derive(Debug)]
enum Reader<'a> {
    File(io::BufReader<fs::File>),
    String(&'a [u8]),
}

/// Reads logical lines from a [Source](source::Source). Lines ending
/// with a backslash are joined with the following line and the
/// source’s token replacements are applied to the joined result.
#[derive(Debug)]
pub struct Stream<'a> {
    source: &'a source::Source,
    reader: Reader<'a>,

    line_num: usize,
    next_line_num: usize,
    reached_eof: bool,
}

#[derive(Error, Debug)]
pub enum StreamError {
    #[error(transparent)]
    IoError(#[from] io::Error),
    /// The token replacements keep matching after replacing them so
    /// the line would never finish.
    #[error("infinite recursion suspected while replacing tokens")]
    TokenReplacementLoop,
}

impl<'a> Stream<'a> {
    /// Opens the data for the source. This fails if the source
    /// refers to a file that can’t be opened.
    pub fn new(source: &source::Source) -> Result<Stream, StreamError> {
        let reader = match source.data() {
            source::Data::File { path } => {
                Reader::File(io::BufReader::new(fs::File::open(path)?))
            },
            source::Data::String { source } => {
                Reader::String(source.as_bytes())
            },
        };

        Ok(Stream {
            source,
            reader,
            line_num: 0,
            next_line_num: 1,
            reached_eof: false,
        })
    }

    /// Appends the next logical line to `line`, joining continued
    /// lines and applying the token replacements.
    ///
    /// Only a backslash directly followed by `\n` or `\r\n` continues
    /// the line. A backslash followed by a lone `\r` is kept as it
    /// is.
    ///
    /// Returns the number of physical lines that were consumed from
    /// the source, which is zero once the end is reached.
    pub fn read_line(
        &mut self,
        line: &mut String,
    ) -> Result<usize, StreamError> {
        let start_length = line.len();
        let start_line_num = self.next_line_num;

        self.line_num = start_line_num;

        while !self.reached_eof {
            let length = match &mut self.reader {
                Reader::File(r) => r.read_line(line)?,
                Reader::String(r) => r.read_line(line)?,
            };

            if length == 0 {
                self.reached_eof = true;
                break;
            }

            self.next_line_num += 1;

            let new_part = &line[line.len() - length..];

            if new_part.ends_with("\\\n") {
                line.truncate(line.len() - 2);
            } else if new_part.ends_with("\\\r\n") {
                line.truncate(line.len() - 3);
            } else {
                break;
            }
        }

        self.process_token_replacements(line, start_length)?;

        Ok(self.next_line_num - start_line_num)
    }

    /// The line number in the source of the start of the last line
    /// returned by [read_line](Stream::read_line). The first line is
    /// number 1.
    pub fn line_num(&self) -> usize {
        self.line_num
    }

    fn process_token_replacements(
        &self,
        line: &mut String,
        start_pos: usize,
    ) -> Result<(), StreamError> {
        let replacements = self.source.token_replacements();

        if replacements.is_empty() {
            return Ok(());
        }

        let mut count = 0usize;
        // The string is modified during the loop so we walk it by
        // byte position instead of with an iterator
        let mut pos = start_pos;

        while pos < line.len() {
            // After each replacement, restart from the first token
            // at the same position because the replacement text can
            // contain tokens too
            while let Some(r) = replacements.iter().find(|r| {
                line[pos..].starts_with(&r.token)
            }) {
                count += 1;

                if count > MAX_TOKEN_REPLACEMENTS {
                    return Err(StreamError::TokenReplacementLoop);
                }

                line.replace_range(pos..pos + r.token.len(), &r.replacement);
            }

            pos += line[pos..].chars().next().map_or(1, char::len_utf8);
        }

        Ok(())
    }
}
