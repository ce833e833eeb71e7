// vkscript
//
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
use std::io;
use std::rc::Rc;
use std::str;

/// A callback that receives the log one line at a time, without the
/// newline terminator. The lines are always valid UTF-8.
pub type WriteCallback = Rc<dyn Fn(&str)>;

/// An object that log messages can be written to. Normally this will
/// just write the messages to standard out, but an application can
/// configure a callback to receive the messages by tweaking the
/// [Config](crate::config::Config). The struct implements `Write` so
/// it can be used with macros like [write!](std::write). The output
/// of the shader compiler and the errors from running a script go
/// here. Diagnostics for developers go through `tracing` instead.
pub struct Logger {
    callback: Option<WriteCallback>,

    // The data is collected into this buffer until we have a complete
    // line to send to the callback.
    buf: Vec<u8>,

    // True if the any data was added from a u8 slice so it might not
    // be valid UTF-8.
    maybe_invalid_utf8: bool,
}

impl Logger {
    /// Construct a new logger that will write to the given callback.
    /// If the callback is `None` then the log will go to the stdout
    /// instead.
    pub fn new(callback: Option<WriteCallback>) -> Logger {
        Logger {
            callback,
            maybe_invalid_utf8: false,

            buf: Vec::new(),
        }
    }

    fn send_range(&mut self, start: usize, end: usize) {
        if self.maybe_invalid_utf8 {
            let mut pos = start;

            loop {
                match str::from_utf8(&self.buf[pos..end]) {
                    Ok(_) => break,
                    Err(e) => {
                        // Replace the offending byte with a question
                        // mark. This should result in valid UTF-8
                        // without having to move the bytes around.
                        self.buf[pos + e.valid_up_to()] = b'?';
                        pos += e.valid_up_to() + 1;
                    },
                }
            }
        }

        let line = String::from_utf8_lossy(&self.buf[start..end]);

        match &self.callback {
            Some(callback) => callback(&line),
            None => println!("{}", line),
        }
    }

    fn flush_lines(&mut self) {
        let mut pos = 0;

        while let Some(line_len) = self.buf[pos..]
            .iter()
            .position(|&c| c == b'\n')
        {
            self.send_range(pos, pos + line_len);
            pos += line_len + 1;
        }

        // Remove the lines that we successfully processed
        self.buf.drain(0..pos);

        if self.buf.is_empty() {
            self.maybe_invalid_utf8 = false;
        }
    }
}

impl io::Write for Logger {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !buf.is_empty() {
            self.maybe_invalid_utf8 = true;
            self.buf.extend_from_slice(buf);
            self.flush_lines();
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            let len = self.buf.len();
            self.send_range(0, len);
            self.buf.clear();
            self.maybe_invalid_utf8 = false;
        }

        Ok(())
    }
}

impl fmt::Write for Logger {
    fn write_str(&mut self, s: &str) -> Result<(), fmt::Error> {
        self.buf.extend_from_slice(s.as_bytes());
        self.flush_lines();
        Ok(())
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Logger")
            .field("has_callback", &self.callback.is_some())
            .field("buffered", &self.buf.len())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::RefCell;

    fn test_logger() -> (Logger, Rc<RefCell<Vec<String>>>) {
        let items = Rc::new(RefCell::new(Vec::new()));
        let callback_items = Rc::clone(&items);

        let logger = Logger::new(Some(Rc::new(move |line: &str| {
            callback_items.borrow_mut().push(line.to_string());
        })));

        (logger, items)
    }

    #[test]
    fn multiple_lines() {
        let (mut logger, items) = test_logger();

        use std::fmt::Write;

        writeln!(
            &mut logger,
            "This is a line\n\
             This is another line.\n\
             This is followed by a number: {}",
            42,
        ).unwrap();

        let items = items.borrow();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], "This is a line");
        assert_eq!(items[1], "This is another line.");
        assert_eq!(items[2], "This is followed by a number: 42");
    }

    #[test]
    fn split_line() {
        let (mut logger, items) = test_logger();

        use std::fmt::Write;

        write!(&mut logger, "Part of first line ").unwrap();
        assert_eq!(items.borrow().len(), 0);
        write!(
            &mut logger,
            "next part of first line\nSecond line\n"
        ).unwrap();
        assert_eq!(
            *items.borrow(),
            ["Part of first line next part of first line", "Second line"],
        );
    }

    #[test]
    fn bad_utf8() {
        let (mut logger, items) = test_logger();

        use std::io::Write;

        logger.write_all(
            b"\xc4u ne mankas bajtoj \xc4\x89i tie \xe2\n"
        ).unwrap();
        assert_eq!(*items.borrow(), ["?u ne mankas bajtoj ĉi tie ?"]);
    }

    #[test]
    fn flush() {
        let (mut logger, items) = test_logger();

        use std::fmt::Write;

        write!(&mut logger, "One line\nUnterminated line").unwrap();
        assert_eq!(*items.borrow(), ["One line"]);

        io::Write::flush(&mut logger).unwrap();

        assert_eq!(*items.borrow(), ["One line", "Unterminated line"]);
        assert!(logger.buf.is_empty());

        io::Write::flush(&mut logger).unwrap();

        assert_eq!(items.borrow().len(), 2);
    }
}
