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

//! Describes where the text of a script comes from.

use std::borrow::Cow;
use std::path::PathBuf;
use thiserror::Error;

/// Where the text for a [Source] is stored. This can either be a
/// path to a file that will be opened when the script is read or a
/// string containing the script directly.
#[derive(Clone, Debug)]
pub enum Data {
    File { path: PathBuf },
    String { source: String },
}

/// A literal token that the line reader will substitute with
/// `replacement` every time it appears in the source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenReplacement {
    pub token: String,
    pub replacement: String,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Token replacement “{0}” must be of the form TOKEN=REPLACEMENT")]
pub struct InvalidTokenReplacement(pub String);

impl std::str::FromStr for TokenReplacement {
    type Err = InvalidTokenReplacement;

    /// Parses a replacement in the form `TOKEN=REPLACEMENT`. The
    /// replacement part may itself contain `=` characters.
    fn from_str(s: &str) -> Result<TokenReplacement, InvalidTokenReplacement> {
        match s.split_once('=') {
            Some((token, replacement)) if !token.is_empty() => {
                Ok(TokenReplacement {
                    token: token.to_owned(),
                    replacement: replacement.to_owned(),
                })
            },
            _ => Err(InvalidTokenReplacement(s.to_owned())),
        }
    }
}

/// A script to be loaded along with the token replacements that
/// should be applied to each of its lines. The struct only records
/// where the data is. Use a [Stream](crate::stream::Stream) to read
/// it.
#[derive(Clone, Debug)]
pub struct Source {
    token_replacements: Vec<TokenReplacement>,
    data: Data,
}

impl Source {
    fn from_data(data: Data) -> Source {
        Source {
            token_replacements: Vec::new(),
            data,
        }
    }

    /// Creates a source that will read lines from the given string.
    pub fn from_string(source: String) -> Source {
        Self::from_data(Data::String { source })
    }

    /// Creates a source that will read lines from the given file.
    pub fn from_file<P: Into<PathBuf>>(path: P) -> Source {
        Self::from_data(Data::File { path: path.into() })
    }

    /// Adds a token replacement to the source. Replacements are
    /// tried in the order they were added and the replacement text
    /// can itself contain tokens. If the replacements never settle
    /// down then reading the line will fail.
    pub fn add_token_replacement(
        &mut self,
        token: String,
        replacement: String,
    ) {
        self.token_replacements.push(TokenReplacement { token, replacement });
    }

    pub fn token_replacements(&self) -> &[TokenReplacement] {
        &self.token_replacements
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    /// Returns a name for the source that is suitable to show to
    /// the user in diagnostics. Sources built from a string are
    /// called `"(string source)"`.
    pub fn filename(&self) -> Cow<'_, str> {
        match &self.data {
            Data::File { path } => path.to_string_lossy(),
            Data::String { .. } => Cow::Borrowed("(string source)"),
        }
    }
}
