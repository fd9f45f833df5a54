use super::error::ParsedNameOrBytes;

use quick_xml::events::Event;

use std::fmt;

/// What the reader found where it expected something else.
#[derive(Debug)]
pub(crate) struct EventSummary {
    name: Option<ParsedNameOrBytes>,
    kind: &'static str,
}

impl fmt::Display for EventSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} `{name}`", self.kind),
            None => f.write_str(self.kind),
        }
    }
}

impl EventSummary {
    pub(crate) fn new(event: &Event) -> Self {
        let (kind, name) = match event {
            Event::Start(s) => ("start tag", Some(s.name())),
            Event::Empty(s) => ("empty tag", Some(s.name())),
            Event::End(e) => ("end tag", Some(e.name())),
            Event::Text(_) => ("text", None),
            Event::Comment(_) => ("comment", None),
            Event::CData(_) => ("cdata section", None),
            Event::Decl(_) => ("xml declaration", None),
            Event::PI(_) => ("processing instruction", None),
            Event::DocType(_) => ("doctype", None),
            Event::Eof => ("end of file", None),
        };
        Self {
            name: name.map(ParsedNameOrBytes::from),
            kind,
        }
    }

    pub(crate) fn eof() -> Self {
        Self::new(&Event::Eof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::events::BytesStart;

    #[test]
    fn names_the_offending_event() {
        let start = Event::Start(BytesStart::new("Piece"));
        assert_eq!(EventSummary::new(&start).to_string(), "start tag `Piece`");
        assert_eq!(EventSummary::eof().to_string(), "end of file");
    }
}
