//! Layered PDF builder
//!
//! Writes a complete PDF file by hand: catalog, page tree, optional content
//! groups and an `/Order` array of any shape, with each piece of the
//! optional content configuration either inline or behind an indirect
//! reference.

/// One optional content group
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub name: String,
    pub on: bool,
    pub locked: bool,
}

impl LayerSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            on: true,
            locked: false,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.on = false;
        self
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }
}

/// An item of an `/Order` array
#[derive(Debug, Clone, PartialEq)]
pub enum OrderItem {
    /// Reference to the layer with this index
    Layer(usize),
    Array(Vec<OrderItem>),
    /// Array stored as its own object and referenced from its parent
    Indirect(Vec<OrderItem>),
    Label(String),
}

impl OrderItem {
    /// Layer followed by its children
    pub fn with_children(layer: usize, children: Vec<OrderItem>) -> [OrderItem; 2] {
        [OrderItem::Layer(layer), OrderItem::Array(children)]
    }

    /// Labelled group
    pub fn group(label: &str, members: Vec<OrderItem>) -> OrderItem {
        let mut items = vec![OrderItem::Label(label.to_string())];
        items.extend(members);
        OrderItem::Array(items)
    }
}

#[derive(Clone)]
struct PageContent {
    width: f32,
    height: f32,
    text: Option<String>,
}

/// Builder for PDFs with optional content
#[derive(Clone)]
pub struct LayeredPdfBuilder {
    version: String,
    pages: Vec<PageContent>,
    layers: Vec<LayerSpec>,
    order: Option<Vec<OrderItem>>,
    raw_order: Option<String>,
    indirect_properties: bool,
    indirect_config: bool,
    indirect_order: bool,
    title: Option<String>,
}

/// Object number of the first layer; catalog and page tree come before
const FIRST_LAYER: u32 = 3;

impl LayeredPdfBuilder {
    pub fn new() -> Self {
        Self {
            version: "1.7".to_string(),
            pages: Vec::new(),
            layers: Vec::new(),
            order: None,
            raw_order: None,
            indirect_properties: false,
            indirect_config: false,
            indirect_order: false,
            title: None,
        }
    }

    /// Object number the layer with `index` is written as
    pub fn layer_xref(index: usize) -> u32 {
        FIRST_LAYER + index as u32
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn add_empty_page(mut self, width: f32, height: f32) -> Self {
        self.pages.push(PageContent {
            width,
            height,
            text: None,
        });
        self
    }

    pub fn add_text_page(mut self, text: &str) -> Self {
        self.pages.push(PageContent {
            width: 612.0,
            height: 792.0,
            text: Some(text.to_string()),
        });
        self
    }

    pub fn add_layer(mut self, layer: LayerSpec) -> Self {
        self.layers.push(layer);
        self
    }

    /// `count` visible layers named `L0`, `L1`, ...
    pub fn with_layers(mut self, count: usize) -> Self {
        for i in 0..count {
            self.layers.push(LayerSpec::new(format!("L{i}")));
        }
        self
    }

    pub fn with_order(mut self, items: Vec<OrderItem>) -> Self {
        self.order = Some(items);
        self
    }

    /// Write `text` verbatim as the `/Order` value
    pub fn with_raw_order(mut self, text: &str) -> Self {
        self.raw_order = Some(text.to_string());
        self
    }

    pub fn with_indirect_properties(mut self) -> Self {
        self.indirect_properties = true;
        self
    }

    pub fn with_indirect_config(mut self) -> Self {
        self.indirect_config = true;
        self
    }

    pub fn with_indirect_order(mut self) -> Self {
        self.indirect_order = true;
        self
    }

    /// Build the PDF
    pub fn build(&self) -> Vec<u8> {
        // Index i holds object i + 1; catalog and page tree are filled last
        let mut objects: Vec<String> = vec![String::new(), String::new()];

        for layer in &self.layers {
            objects.push(format!(
                "<< /Type /OCG /Name ({}) >>",
                escape_pdf_string(&layer.name)
            ));
        }

        let mut kids = Vec::new();
        for page in &self.pages {
            let page_num = objects.len() as u32 + 1;
            kids.push(format!("{page_num} 0 R"));
            let mut dict = format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}]",
                page.width, page.height
            );
            match &page.text {
                Some(text) => {
                    dict.push_str(&format!(
                        " /Resources << /Font << /F1 << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> >> >> /Contents {} 0 R >>",
                        page_num + 1
                    ));
                    objects.push(dict);
                    let content = format!(
                        "BT\n/F1 12 Tf\n72 720 Td\n({}) Tj\nET",
                        escape_pdf_string(text)
                    );
                    objects.push(format!(
                        "<< /Length {} >>\nstream\n{}\nendstream",
                        content.len(),
                        content
                    ));
                }
                None => {
                    dict.push_str(" >>");
                    objects.push(dict);
                }
            }
        }
        objects[1] = format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            self.pages.len()
        );

        let mut catalog = "<< /Type /Catalog /Pages 2 0 R".to_string();
        if !self.layers.is_empty() || self.order.is_some() || self.raw_order.is_some() {
            let properties = self.write_properties(&mut objects);
            catalog.push_str(&format!(" /OCProperties {properties}"));
        }
        catalog.push_str(" >>");
        objects[0] = catalog;

        let info = self.title.as_ref().map(|title| {
            objects.push(format!("<< /Title ({}) >>", escape_pdf_string(title)));
            objects.len()
        });

        write_file(&self.version, &objects, info)
    }

    /// The `/OCProperties` value, inline or as a reference
    fn write_properties(&self, objects: &mut Vec<String>) -> String {
        let mut config = format!(
            "<< /Name (Default) /ON {} /OFF {} /Locked {}",
            layer_refs(&self.layers, |l| l.on),
            layer_refs(&self.layers, |l| !l.on),
            layer_refs(&self.layers, |l| l.locked),
        );
        let order = match (&self.raw_order, &self.order) {
            (Some(raw), _) => Some(raw.clone()),
            (None, Some(items)) => Some(order_text(items, objects)),
            (None, None) => None,
        };
        if let Some(order) = order {
            let order = if self.indirect_order {
                reference(objects, order)
            } else {
                order
            };
            config.push_str(&format!(" /Order {order}"));
        }
        config.push_str(" >>");
        let config = if self.indirect_config {
            reference(objects, config)
        } else {
            config
        };

        let properties = format!(
            "<< /OCGs {} /D {} >>",
            layer_refs(&self.layers, |_| true),
            config
        );
        if self.indirect_properties {
            reference(objects, properties)
        } else {
            properties
        }
    }
}

impl Default for LayeredPdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn layer_refs(layers: &[LayerSpec], filter: impl Fn(&LayerSpec) -> bool) -> String {
    let refs: Vec<String> = layers
        .iter()
        .enumerate()
        .filter(|(_, layer)| filter(layer))
        .map(|(i, _)| format!("{} 0 R", LayeredPdfBuilder::layer_xref(i)))
        .collect();
    format!("[{}]", refs.join(" "))
}

/// Store `body` as a new object and return a reference to it
fn reference(objects: &mut Vec<String>, body: String) -> String {
    objects.push(body);
    format!("{} 0 R", objects.len())
}

fn order_text(items: &[OrderItem], objects: &mut Vec<String>) -> String {
    let parts: Vec<String> = items
        .iter()
        .map(|item| match item {
            OrderItem::Layer(index) => format!("{} 0 R", LayeredPdfBuilder::layer_xref(*index)),
            OrderItem::Array(nested) => order_text(nested, objects),
            OrderItem::Indirect(nested) => {
                let body = order_text(nested, objects);
                reference(objects, body)
            }
            OrderItem::Label(label) => format!("({})", escape_pdf_string(label)),
        })
        .collect();
    format!("[{}]", parts.join(" "))
}

fn write_file(version: &str, objects: &[String], info: Option<usize>) -> Vec<u8> {
    let mut pdf = Vec::new();
    pdf.extend_from_slice(format!("%PDF-{version}\n").as_bytes());
    pdf.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_offset = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    pdf.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        pdf.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }

    let mut trailer = format!("<< /Size {} /Root 1 0 R", objects.len() + 1);
    if let Some(info) = info {
        trailer.push_str(&format!(" /Info {info} 0 R"));
    }
    trailer.push_str(" >>");
    pdf.extend_from_slice(
        format!("trailer\n{trailer}\nstartxref\n{xref_offset}\n%%EOF\n").as_bytes(),
    );
    pdf
}

/// Escape special characters in PDF strings
fn escape_pdf_string(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '(' => "\\(".to_string(),
            ')' => "\\)".to_string(),
            '\\' => "\\\\".to_string(),
            '\n' => "\\n".to_string(),
            '\r' => "\\r".to_string(),
            _ => c.to_string(),
        })
        .collect()
}
