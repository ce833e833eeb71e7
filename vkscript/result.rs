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

use std::fmt;

/// The outcome of running a test script.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Result {
    Pass,
    Fail,
    Skip,
}

impl Result {
    /// Merge this result with another one. If either test is skipped
    /// then the value of the other result is returned. Otherwise if
    /// either of the tests failed then the global result is a
    /// failure. Finally if both tests passed then the global result
    /// is a pass.
    pub fn merge(self, other: Result) -> Result {
        match self {
            Result::Pass => {
                if other == Result::Skip {
                    self
                } else {
                    other
                }
            },
            Result::Fail => Result::Fail,
            Result::Skip => other,
        }
    }

    /// Return either `"fail"`, `"skip"` or `"pass"` to describe the
    /// result.
    pub fn name(self) -> &'static str {
        match self {
            Result::Fail => "fail",
            Result::Skip => "skip",
            Result::Pass => "pass",
        }
    }
}

impl fmt::Display for Result {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Merges all of the results. An empty set of results is a skip.
impl FromIterator<Result> for Result {
    fn from_iter<I: IntoIterator<Item = Result>>(iter: I) -> Result {
        iter.into_iter().fold(Result::Skip, Result::merge)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_merge() {
        assert_eq!(Result::Fail.merge(Result::Fail), Result::Fail);
        assert_eq!(Result::Fail.merge(Result::Skip), Result::Fail);
        assert_eq!(Result::Fail.merge(Result::Pass), Result::Fail);
        assert_eq!(Result::Skip.merge(Result::Fail), Result::Fail);
        assert_eq!(Result::Skip.merge(Result::Skip), Result::Skip);
        assert_eq!(Result::Skip.merge(Result::Pass), Result::Pass);
        assert_eq!(Result::Pass.merge(Result::Fail), Result::Fail);
        assert_eq!(Result::Pass.merge(Result::Skip), Result::Pass);
        assert_eq!(Result::Pass.merge(Result::Pass), Result::Pass);
    }

    #[test]
    fn test_name() {
        for (res, name) in [
            (Result::Fail, "fail"),
            (Result::Skip, "skip"),
            (Result::Pass, "pass"),
        ] {
            assert_eq!(res.name(), name);
            assert_eq!(res.to_string(), name);
        }
    }

    #[test]
    fn test_collect() {
        assert_eq!(std::iter::empty().collect::<Result>(), Result::Skip);
        assert_eq!(
            [Result::Skip, Result::Pass, Result::Skip]
                .into_iter()
                .collect::<Result>(),
            Result::Pass,
        );
        assert_eq!(
            [Result::Pass, Result::Fail, Result::Pass]
                .into_iter()
                .collect::<Result>(),
            Result::Fail,
        );
    }

    fn any_result() -> impl Strategy<Value = Result> {
        prop_oneof![Just(Result::Pass), Just(Result::Fail), Just(Result::Skip)]
    }

    proptest! {
        #[test]
        fn merge_is_associative(
            a in any_result(),
            b in any_result(),
            c in any_result(),
        ) {
            prop_assert_eq!(a.merge(b).merge(c), a.merge(b.merge(c)));
        }

        #[test]
        fn fail_absorbs(a in any_result()) {
            prop_assert_eq!(a.merge(Result::Fail), Result::Fail);
            prop_assert_eq!(Result::Fail.merge(a), Result::Fail);
        }

        #[test]
        fn skip_is_identity(a in any_result()) {
            prop_assert_eq!(a.merge(Result::Skip), a);
            prop_assert_eq!(Result::Skip.merge(a), a);
        }
    }
}
