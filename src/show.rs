// ============================================================================
// src/show.rs – Scanner for `drbdsetup show` output
// ============================================================================
//! `drbdsetup show all` prints the running configuration in drbd.conf syntax:
//! nested `keyword [args] { ... }` sections and `keyword args;` statements.
//! We only need the resource names and, per volume, the minor number and the
//! backing devices, so the parser is a single pass over a flat token stream
//! with a stack of open sections.

use crate::error::{DrbdError, Result};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Unquoted run of characters: keywords, numbers, paths, addresses.
    Word(String),
    /// Double-quoted string with the quotes removed.
    Quoted(String),
    Open,
    Close,
    Semi,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

impl Token {
    fn text(&self) -> &str {
        match &self.kind {
            TokenKind::Word(s) | TokenKind::Quoted(s) => s,
            TokenKind::Open => "{",
            TokenKind::Close => "}",
            TokenKind::Semi => ";",
        }
    }

    fn word(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Word(s) => Some(s),
            _ => None,
        }
    }

    fn value(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Word(s) | TokenKind::Quoted(s) => Some(s),
            _ => None,
        }
    }
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '{' | '}' | ';' | '"')
}

/// Split `input` into tokens, dropping `#`, `//` and `/* */` comments.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            '\n' => {
                line += 1;
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if next == Some('/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if next == Some('*') => {
                let start = line;
                i += 2;
                loop {
                    match chars.get(i) {
                        None => {
                            return Err(DrbdError::Syntax {
                                line: start,
                                msg: "unterminated comment".into(),
                            })
                        }
                        Some('*') if chars.get(i + 1) == Some(&'/') => {
                            i += 2;
                            break;
                        }
                        Some('\n') => {
                            line += 1;
                            i += 1;
                        }
                        Some(_) => i += 1,
                    }
                }
            }
            '{' | '}' | ';' => {
                let kind = match c {
                    '{' => TokenKind::Open,
                    '}' => TokenKind::Close,
                    _ => TokenKind::Semi,
                };
                tokens.push(Token { kind, line });
                i += 1;
            }
            '"' => {
                let start = line;
                let mut s = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => {
                            return Err(DrbdError::Syntax {
                                line: start,
                                msg: "unterminated string".into(),
                            })
                        }
                        Some('"') => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            if let Some(&esc) = chars.get(i + 1) {
                                s.push(esc);
                                i += 2;
                            } else {
                                i += 1;
                            }
                        }
                        Some(&ch) => {
                            if ch == '\n' {
                                line += 1;
                            }
                            s.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Quoted(s),
                    line: start,
                });
            }
            _ => {
                let begin = i;
                while i < chars.len() && is_word_char(chars[i]) {
                    i += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Word(chars[begin..i].iter().collect()),
                    line,
                });
            }
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VolumeShow {
    /// `None` for a minor declared outside any `volume N { }` section.
    pub volume: Option<u32>,
    pub minor: Option<u32>,
    pub disk: Option<String>,
    pub meta_disk: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceShow {
    pub name: String,
    pub volumes: Vec<VolumeShow>,
}

impl ResourceShow {
    /// First volume that is bound to a minor.
    pub fn primary_volume(&self) -> Option<&VolumeShow> {
        self.volumes.iter().find(|v| v.minor.is_some())
    }

    fn volume_index(&mut self, number: Option<u32>) -> usize {
        if let Some(idx) = self.volumes.iter().position(|v| v.volume == number) {
            return idx;
        }
        self.volumes.push(VolumeShow {
            volume: number,
            ..Default::default()
        });
        self.volumes.len() - 1
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShowReport {
    pub resources: Vec<ResourceShow>,
}

impl ShowReport {
    pub fn resource_names(&self) -> Vec<String> {
        self.resources.iter().map(|r| r.name.clone()).collect()
    }

    pub fn find(&self, name: &str) -> Option<&ResourceShow> {
        self.resources.iter().find(|r| r.name == name)
    }

    fn resource_index(&mut self, name: &str) -> usize {
        if let Some(idx) = self.resources.iter().position(|r| r.name == name) {
            return idx;
        }
        self.resources.push(ResourceShow {
            name: name.to_string(),
            volumes: Vec::new(),
        });
        self.resources.len() - 1
    }
}

#[derive(Debug, Clone, Copy)]
enum Frame {
    Resource(usize),
    Volume(usize, usize),
    Other,
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    stack: Vec<Frame>,
    report: ShowReport,
}

impl<'t> Parser<'t> {
    fn next(&mut self) -> Option<&'t Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    /// The token following `keyword`, which must exist.
    fn operand(&mut self, keyword: &str) -> Result<&'t Token> {
        self.next().ok_or_else(|| DrbdError::UnexpectedEof {
            keyword: keyword.to_string(),
        })
    }

    fn number(&mut self, keyword: &str) -> Result<u32> {
        let tok = self.operand(keyword)?;
        tok.word()
            .and_then(|w| w.parse::<u32>().ok())
            .ok_or_else(|| DrbdError::BadNumber {
                keyword: keyword.to_string(),
                token: tok.text().to_string(),
                line: tok.line,
            })
    }

    fn current_resource(&self) -> Option<usize> {
        self.stack.iter().rev().find_map(|f| match *f {
            Frame::Resource(r) | Frame::Volume(r, _) => Some(r),
            Frame::Other => None,
        })
    }

    fn current_volume(&self) -> Option<(usize, usize)> {
        self.stack.iter().rev().find_map(|f| match *f {
            Frame::Volume(r, v) => Some((r, v)),
            _ => None,
        })
    }

    fn open_if_brace(&mut self, frame: Frame) {
        if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Open)) {
            self.pos += 1;
            self.stack.push(frame);
        }
    }

    fn run(mut self) -> Result<ShowReport> {
        while let Some(tok) = self.next() {
            match &tok.kind {
                TokenKind::Open => self.stack.push(Frame::Other),
                TokenKind::Close => {
                    if self.stack.pop().is_none() {
                        return Err(DrbdError::Syntax {
                            line: tok.line,
                            msg: "unbalanced '}'".into(),
                        });
                    }
                }
                TokenKind::Word(w) => match w.as_str() {
                    "resource" => self.resource()?,
                    "volume" => self.volume()?,
                    "minor" => self.minor()?,
                    "disk" | "meta-disk" => self.backing(w)?,
                    _ => {}
                },
                TokenKind::Quoted(_) | TokenKind::Semi => {}
            }
        }
        Ok(self.report)
    }

    fn resource(&mut self) -> Result<()> {
        let tok = self.operand("resource")?;
        let name = tok.value().ok_or_else(|| DrbdError::Syntax {
            line: tok.line,
            msg: format!("expected a resource name, found '{}'", tok.text()),
        })?;
        if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Open)) {
            let idx = self.report.resource_index(name);
            self.open_if_brace(Frame::Resource(idx));
        }
        Ok(())
    }

    fn volume(&mut self) -> Result<()> {
        let number = self.number("volume")?;
        let frame = match self.current_resource() {
            Some(r) => Frame::Volume(r, self.report.resources[r].volume_index(Some(number))),
            None => Frame::Other,
        };
        self.open_if_brace(frame);
        Ok(())
    }

    fn minor(&mut self) -> Result<()> {
        let minor = self.number("minor")?;
        let slot = match self.current_volume() {
            Some(rv) => Some(rv),
            None => self
                .current_resource()
                .map(|r| (r, self.report.resources[r].volume_index(None))),
        };
        if let Some((r, v)) = slot {
            self.report.resources[r].volumes[v].minor = Some(minor);
        }
        Ok(())
    }

    fn backing(&mut self, keyword: &str) -> Result<()> {
        let Some((r, v)) = self.current_volume() else {
            return Ok(());
        };
        // `disk { ... }` is an option section, not a device.
        let Some(value) = self.peek().and_then(Token::value) else {
            return Ok(());
        };
        self.pos += 1;
        let vol = &mut self.report.resources[r].volumes[v];
        if keyword == "disk" {
            vol.disk = Some(value.to_string());
        } else {
            vol.meta_disk = Some(value.to_string());
        }
        Ok(())
    }
}

/// Parse the text printed by `drbdsetup show [all|NAME]`.
pub fn parse_show(input: &str) -> Result<ShowReport> {
    let tokens = tokenize(input)?;
    Parser {
        tokens: &tokens,
        pos: 0,
        stack: Vec::new(),
        report: ShowReport::default(),
    }
    .run()
}
