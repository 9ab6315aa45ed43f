//! `<ITStudent>` markup body.
//!
//! ```text
//! <ITStudent>
//!   <Name>…</Name>
//!   <StudentID>…</StudentID>
//!   <Programme>…</Programme>
//!   <Courses>
//!     <Course><CourseName>…</CourseName><Mark>INTEGER</Mark></Course>
//!     ...
//!   </Courses>
//! </ITStudent>
//! ```
//!
//! The encoder emits the document without a declaration or indentation.
//! The decoder accepts any layout, ignores unknown elements and takes the
//! first occurrence of a repeated field.

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{RecordError, Result};
use crate::model::{CourseMark, Record};

pub const ROOT: &str = "ITStudent";
pub const NAME: &str = "Name";
pub const STUDENT_ID: &str = "StudentID";
pub const PROGRAMME: &str = "Programme";
pub const COURSES: &str = "Courses";
pub const COURSE: &str = "Course";
pub const COURSE_NAME: &str = "CourseName";
pub const MARK: &str = "Mark";

/// Serialize a record into its markup document.
pub fn to_markup(record: &Record) -> String {
    let mut out = String::with_capacity(192 + record.marks().len() * 64);
    open(&mut out, ROOT);
    leaf(&mut out, NAME, record.name());
    leaf(&mut out, STUDENT_ID, record.student_id());
    leaf(&mut out, PROGRAMME, record.programme());
    open(&mut out, COURSES);
    for mark in record.marks() {
        open(&mut out, COURSE);
        leaf(&mut out, COURSE_NAME, mark.course());
        leaf(&mut out, MARK, &mark.mark().to_string());
        close(&mut out, COURSE);
    }
    close(&mut out, COURSES);
    close(&mut out, ROOT);
    out
}

/// Parse a markup body that is expected to be UTF-8.
pub fn from_markup_bytes(body: &[u8]) -> Result<Record> {
    let text = std::str::from_utf8(body)
        .map_err(|err| RecordError::malformed(format!("body is not valid UTF-8: {err}")))?;
    from_markup(text)
}

/// Parse a markup document back into a record.
pub fn from_markup(document: &str) -> Result<Record> {
    let mut reader = Reader::from_str(document);
    let mut parser = Parser::default();

    loop {
        let event = reader
            .read_event()
            .map_err(|err| RecordError::malformed(format!("invalid markup: {err}")))?;
        match event {
            Event::Start(start) => {
                let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                parser.open(tag)?;
            }
            Event::Empty(start) => {
                let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                parser.open(tag)?;
                parser.close()?;
            }
            Event::End(_) => parser.close()?,
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|err| RecordError::malformed(format!("invalid text: {err}")))?;
                parser.text(&text);
            }
            Event::CData(data) => {
                let raw = data.into_inner();
                let text = std::str::from_utf8(&raw).map_err(|err| {
                    RecordError::malformed(format!("CDATA is not valid UTF-8: {err}"))
                })?;
                parser.text(text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    parser.finish()
}

fn open(out: &mut String, tag: &str) {
    out.push('<');
    out.push_str(tag);
    out.push('>');
}

fn close(out: &mut String, tag: &str) {
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn leaf(out: &mut String, tag: &str, text: &str) {
    open(out, tag);
    out.push_str(&escape(text));
    close(out, tag);
}

#[derive(Default)]
struct CourseDraft {
    name: Option<String>,
    mark: Option<String>,
}

#[derive(Default)]
struct Parser {
    path: Vec<String>,
    text: String,
    root_seen: bool,
    name: Option<String>,
    student_id: Option<String>,
    programme: Option<String>,
    courses: Option<Vec<CourseMark>>,
    collecting: Option<Vec<CourseMark>>,
    course: Option<CourseDraft>,
}

impl Parser {
    fn at(&self, expected: &[&str]) -> bool {
        self.path.len() == expected.len()
            && self.path.iter().zip(expected).all(|(a, b)| a == b)
    }

    fn open(&mut self, tag: String) -> Result<()> {
        if self.path.is_empty() {
            if self.root_seen {
                return Err(RecordError::malformed("multiple root elements"));
            }
            if tag != ROOT {
                return Err(RecordError::malformed(format!(
                    "root element is <{tag}>, expected <{ROOT}>"
                )));
            }
            self.root_seen = true;
        }

        self.path.push(tag);
        self.text.clear();

        if self.at(&[ROOT, COURSES]) && self.courses.is_none() && self.collecting.is_none() {
            self.collecting = Some(Vec::new());
        } else if self.at(&[ROOT, COURSES, COURSE]) && self.collecting.is_some() {
            self.course = Some(CourseDraft::default());
        }
        Ok(())
    }

    fn text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn close(&mut self) -> Result<()> {
        let text = std::mem::take(&mut self.text);
        let Some(tag) = self.path.pop() else {
            return Err(RecordError::malformed("unbalanced closing tag"));
        };

        if self.at(&[ROOT]) {
            match tag.as_str() {
                NAME => set_once(&mut self.name, text),
                STUDENT_ID => set_once(&mut self.student_id, text),
                PROGRAMME => set_once(&mut self.programme, text),
                COURSES => {
                    if let Some(collected) = self.collecting.take() {
                        self.courses = Some(collected);
                    }
                }
                _ => {}
            }
        } else if self.at(&[ROOT, COURSES]) && tag == COURSE {
            if let (Some(draft), Some(collected)) = (self.course.take(), self.collecting.as_mut())
            {
                let index = collected.len();
                collected.push(finish_course(draft, index)?);
            }
        } else if self.at(&[ROOT, COURSES, COURSE]) {
            if let Some(draft) = self.course.as_mut() {
                match tag.as_str() {
                    COURSE_NAME => set_once(&mut draft.name, text),
                    MARK => set_once(&mut draft.mark, text),
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Record> {
        if !self.root_seen {
            return Err(RecordError::malformed(format!("missing <{ROOT}> element")));
        }
        if !self.path.is_empty() {
            return Err(RecordError::malformed(format!(
                "unclosed <{}> element",
                self.path.join("/")
            )));
        }
        let name = self.name.ok_or_else(|| missing(NAME))?;
        let student_id = self.student_id.ok_or_else(|| missing(STUDENT_ID))?;
        let programme = self.programme.ok_or_else(|| missing(PROGRAMME))?;
        let courses = self.courses.ok_or_else(|| missing(COURSES))?;
        Ok(Record::new(name, student_id, programme, courses))
    }
}

fn set_once(slot: &mut Option<String>, value: String) {
    if slot.is_none() {
        *slot = Some(value);
    }
}

fn missing(field: &str) -> RecordError {
    RecordError::malformed(format!("missing <{field}> element"))
}

fn finish_course(draft: CourseDraft, index: usize) -> Result<CourseMark> {
    let name = draft.name.ok_or_else(|| {
        RecordError::malformed(format!("course #{index} is missing <{COURSE_NAME}>"))
    })?;
    let raw = draft
        .mark
        .ok_or_else(|| RecordError::malformed(format!("course {name:?} is missing <{MARK}>")))?;
    let mark: i64 = raw.trim().parse().map_err(|_| {
        RecordError::malformed(format!("course {name:?} has non-integer mark {raw:?}"))
    })?;
    CourseMark::from_i64(name, mark).map_err(|err| RecordError::malformed(err.to_string()))
}
