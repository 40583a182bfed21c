//! XMP metadata packets for compliance modes.
//!
//! PDF/A and PDF/UA require the document metadata to be mirrored in an XMP
//! stream referenced from the catalog, together with a conformance
//! identification schema. See ISO 32000-1:2008, Section 14.3.2.

use super::pdf_writer::ComplianceMode;
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::escape::escape;

const NS_X: &str = "adobe:ns:meta/";
const NS_RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
const NS_DC: &str = "http://purl.org/dc/elements/1.1/";
const NS_XMP: &str = "http://ns.adobe.com/xap/1.0/";
const NS_PDF: &str = "http://ns.adobe.com/pdf/1.3/";
const NS_PDFAID: &str = "http://www.aiim.org/pdfa/ns/id/";
const NS_PDFUAID: &str = "http://www.aiim.org/pdfua/ns/id/";

/// XMP packet builder.
#[derive(Debug, Clone)]
pub struct XmpWriter {
    title: Option<String>,
    author: Option<String>,
    subject: Option<String>,
    keywords: Option<String>,
    creator_tool: Option<String>,
    producer: Option<String>,
    language: String,
    date: DateTime<Utc>,
    compliance: ComplianceMode,
}

impl XmpWriter {
    /// Start a packet stamped with `date` (used for create, modify and metadata dates).
    pub fn new(compliance: ComplianceMode, date: DateTime<Utc>) -> Self {
        Self {
            title: None,
            author: None,
            subject: None,
            keywords: None,
            creator_tool: None,
            producer: None,
            language: "x-default".to_string(),
            date,
            compliance,
        }
    }

    /// Set the document title.
    pub fn title(mut self, title: Option<&str>) -> Self {
        self.title = title.map(str::to_string);
        self
    }

    /// Set the author.
    pub fn author(mut self, author: Option<&str>) -> Self {
        self.author = author.map(str::to_string);
        self
    }

    /// Set the subject (written as `dc:description`).
    pub fn subject(mut self, subject: Option<&str>) -> Self {
        self.subject = subject.map(str::to_string);
        self
    }

    /// Set the keywords.
    pub fn keywords(mut self, keywords: Option<&str>) -> Self {
        self.keywords = keywords.map(str::to_string);
        self
    }

    /// Set the creator tool.
    pub fn creator_tool(mut self, tool: Option<&str>) -> Self {
        self.creator_tool = tool.map(str::to_string);
        self
    }

    /// Set the producer.
    pub fn producer(mut self, producer: Option<&str>) -> Self {
        self.producer = producer.map(str::to_string);
        self
    }

    /// Set the `dc:language` entry.
    pub fn language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    /// Build the packet bytes.
    pub fn build_bytes(self) -> Vec<u8> {
        self.build().into_bytes()
    }

    /// Build the packet.
    pub fn build(self) -> String {
        let date = self.date.to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut xml = String::new();
        xml.push_str("<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n");
        xml.push_str(&format!("<x:xmpmeta xmlns:x=\"{}\">\n", NS_X));
        xml.push_str(&format!("  <rdf:RDF xmlns:rdf=\"{}\">\n", NS_RDF));

        xml.push_str(&format!("    <rdf:Description rdf:about=\"\" xmlns:dc=\"{}\">\n", NS_DC));
        xml.push_str("      <dc:format>application/pdf</dc:format>\n");
        if let Some(title) = &self.title {
            xml.push_str(&format!(
                "      <dc:title><rdf:Alt><rdf:li xml:lang=\"x-default\">{}</rdf:li></rdf:Alt></dc:title>\n",
                escape(title)
            ));
        }
        if let Some(author) = &self.author {
            xml.push_str(&format!(
                "      <dc:creator><rdf:Seq><rdf:li>{}</rdf:li></rdf:Seq></dc:creator>\n",
                escape(author)
            ));
        }
        if let Some(subject) = &self.subject {
            xml.push_str(&format!(
                "      <dc:description><rdf:Alt><rdf:li xml:lang=\"x-default\">{}</rdf:li></rdf:Alt></dc:description>\n",
                escape(subject)
            ));
        }
        xml.push_str(&format!(
            "      <dc:language><rdf:Bag><rdf:li>{}</rdf:li></rdf:Bag></dc:language>\n",
            escape(&self.language)
        ));
        xml.push_str("    </rdf:Description>\n");

        xml.push_str(&format!("    <rdf:Description rdf:about=\"\" xmlns:xmp=\"{}\">\n", NS_XMP));
        xml.push_str(&format!("      <xmp:CreateDate>{}</xmp:CreateDate>\n", date));
        xml.push_str(&format!("      <xmp:ModifyDate>{}</xmp:ModifyDate>\n", date));
        xml.push_str(&format!("      <xmp:MetadataDate>{}</xmp:MetadataDate>\n", date));
        if let Some(tool) = &self.creator_tool {
            xml.push_str(&format!("      <xmp:CreatorTool>{}</xmp:CreatorTool>\n", escape(tool)));
        }
        xml.push_str("    </rdf:Description>\n");

        xml.push_str(&format!("    <rdf:Description rdf:about=\"\" xmlns:pdf=\"{}\">\n", NS_PDF));
        if let Some(producer) = &self.producer {
            xml.push_str(&format!("      <pdf:Producer>{}</pdf:Producer>\n", escape(producer)));
        }
        if let Some(keywords) = &self.keywords {
            xml.push_str(&format!("      <pdf:Keywords>{}</pdf:Keywords>\n", escape(keywords)));
        }
        xml.push_str("    </rdf:Description>\n");

        match self.compliance {
            ComplianceMode::PdfA2a => {
                xml.push_str(&format!("    <rdf:Description rdf:about=\"\" xmlns:pdfaid=\"{}\">\n", NS_PDFAID));
                xml.push_str("      <pdfaid:part>2</pdfaid:part>\n");
                xml.push_str("      <pdfaid:conformance>A</pdfaid:conformance>\n");
                xml.push_str("    </rdf:Description>\n");
            },
            ComplianceMode::PdfUa1 => {
                xml.push_str(&format!("    <rdf:Description rdf:about=\"\" xmlns:pdfuaid=\"{}\">\n", NS_PDFUAID));
                xml.push_str("      <pdfuaid:part>1</pdfuaid:part>\n");
                xml.push_str("    </rdf:Description>\n");
            },
            ComplianceMode::None => {},
        }

        xml.push_str("  </rdf:RDF>\n");
        xml.push_str("</x:xmpmeta>\n");
        // Padding lets editors update the packet in place
        for _ in 0..20 {
            xml.push_str(&" ".repeat(99));
            xml.push('\n');
        }
        xml.push_str("<?xpacket end=\"w\"?>");
        xml
    }
}
