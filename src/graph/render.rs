//! SVG rendering of a graph view.

use super::model::Category;
use super::view::GraphView;

const BACKGROUND: &str = "#ffffff";
const FOREGROUND: &str = "#1a1a2e";
const BORDER: &str = "#cbd5e1";
const HIGHLIGHT: &str = "#1f2937";

/// Render the view as a standalone SVG document.
///
/// Element ids are prefixed with the view instance so documents from
/// different submissions never share ids.
pub fn render_svg(view: &GraphView) -> String {
    let (width, height) = view.size();
    let mut svg = String::new();

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 {w} {h}\" width=\"{w}\" height=\"{h}\" font-family=\"sans-serif\">\n",
        w = width,
        h = height
    ));
    svg.push_str(&format!(
        "<rect width=\"{}\" height=\"{}\" fill=\"{}\"/>\n",
        width, height, BACKGROUND
    ));

    let t = view.transform();
    svg.push_str(&format!(
        "<g id=\"graph-{}\" transform=\"translate({:.2},{:.2}) scale({:.4})\">\n",
        view.instance(),
        t.x,
        t.y,
        t.k
    ));
    svg.push_str(&render_edges(view));
    svg.push_str(&render_nodes(view));
    svg.push_str("</g>\n");

    svg.push_str(&render_legend(height));
    svg.push_str("</svg>\n");

    svg
}

fn render_edges(view: &GraphView) -> String {
    let mut out = String::from("<g class=\"edges\" stroke=\"");
    out.push_str(BORDER);
    out.push_str("\" stroke-opacity=\"0.6\" stroke-width=\"2\">\n");

    let bodies = view.simulation().bodies();
    for (s, t) in view.graph().edge_indices() {
        let (a, b) = (&bodies[s], &bodies[t]);
        out.push_str(&format!(
            "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\"/>\n",
            a.x, a.y, b.x, b.y
        ));
    }

    out.push_str("</g>\n");
    out
}

fn render_nodes(view: &GraphView) -> String {
    let mut out = String::from("<g class=\"nodes\">\n");
    let bodies = view.simulation().bodies();
    let hovered = view.hovered();

    for (i, (node, body)) in view.graph().nodes().iter().zip(bodies).enumerate() {
        let (stroke, stroke_width) = if hovered == Some(i) {
            (HIGHLIGHT, 3)
        } else {
            (BORDER, 2)
        };
        let label = escape_xml(node.label());

        out.push_str(&format!(
            "<g id=\"g{}-node-{}\" class=\"node {}\" transform=\"translate({:.2},{:.2})\">\n",
            view.instance(),
            i,
            node.category().to_string().to_lowercase(),
            body.x,
            body.y
        ));
        out.push_str(&format!(
            "<title>{}</title>\n<circle r=\"{}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"{}\"/>\n",
            escape_xml(node.id.as_str()),
            node.radius,
            node.category().color(),
            stroke,
            stroke_width
        ));
        // Halo behind the label keeps it legible over edges.
        out.push_str(&format!(
            "<text x=\"{x}\" y=\"0.31em\" font-size=\"12\" fill=\"none\" stroke=\"{bg}\" stroke-width=\"3\">{l}</text>\n<text x=\"{x}\" y=\"0.31em\" font-size=\"12\" fill=\"{fg}\">{l}</text>\n",
            x = node.radius + 5.0,
            bg = BACKGROUND,
            fg = FOREGROUND,
            l = label
        ));
        out.push_str("</g>\n");
    }

    out.push_str("</g>\n");
    out
}

/// Legend listing every category, populated or not.
fn render_legend(height: f64) -> String {
    let mut out = format!(
        "<g class=\"legend\" transform=\"translate(20,{})\">\n",
        height - 100.0
    );
    for (i, category) in Category::ALL.iter().enumerate() {
        out.push_str(&format!(
            "<g transform=\"translate(0,{})\"><circle r=\"7\" fill=\"{}\"/><text x=\"15\" y=\"5\" font-size=\"12\" fill=\"{}\">{}</text></g>\n",
            i * 25,
            category.color(),
            FOREGROUND,
            category
        ));
    }
    out.push_str("</g>\n");
    out
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
