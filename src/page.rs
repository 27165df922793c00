//! Page builder.
//!
//! Produces a self-contained HTML document that renders one diagram into
//! `#container` and records the outcome on [`RESULT_SLOT`]. Every value that
//! ends up inside script text goes through [`script_json`].

use serde::Serialize;
use serde_json::{Map, Value};

use crate::assets::RendererAssets;
use crate::options::{IconPack, RenderOptions};
use crate::{RenderError, Result};

/// Id of the node the diagram is rendered into.
pub const CONTAINER_ID: &str = "container";

/// Global the page writes its completion record to.
pub const RESULT_SLOT: &str = "__mmd_result";

/// Selector of the rendered SVG root.
pub const SVG_SELECTOR: &str = "#container svg";

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <style>
    body { margin: 0; padding: 0; font-family: sans-serif; }
  </style>
</head>
<body>
  <div id="container"></div>
"#;

const PAGE_TAIL: &str = "</body>\n</html>\n";

const DRIVER_SCRIPT: &str = r#"
    async function renderDiagram(input) {
      try {
        const extension = globalThis['mermaid-zenuml'];
        if (extension && extension.default) {
          await mermaid.registerExternalDiagrams([extension.default]);
        } else if (extension) {
          await mermaid.registerExternalDiagrams([extension]);
        }

        if (input.iconPacks.length > 0) {
          mermaid.registerIconPacks(input.iconPacks.map(({ name, url }) => ({
            name,
            loader: () => fetch(url)
              .then((res) => res.json())
              .catch(() => console.error('Failed to fetch icon: ' + name)),
          })));
        }

        mermaid.initialize({ startOnLoad: false, ...input.config });

        const container = document.getElementById('container');
        const { svg: svgText } = await mermaid.render(input.svgId, input.definition, container);
        container.innerHTML = svgText;

        const svg = container.getElementsByTagName('svg')[0];
        if (svg && svg.style) {
          svg.style.backgroundColor = input.backgroundColor;
        }

        if (input.css) {
          const style = document.createElementNS('http://www.w3.org/2000/svg', 'style');
          style.appendChild(document.createTextNode(input.css));
          svg.appendChild(style);
        }

        let title = null;
        let desc = null;
        if (svg.firstChild && svg.firstChild.nodeName === 'title') {
          title = svg.firstChild.textContent;
        }
        for (const node of svg.children) {
          if (node.nodeName === 'desc') {
            desc = node.textContent;
            break;
          }
        }

        window.__mmd_result = { title, desc, success: true };
      } catch (e) {
        window.__mmd_result = { error: (e && e.message) || String(e), success: false };
      }
    }
"#;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageInput<'a> {
    config: &'a Map<String, Value>,
    definition: &'a str,
    svg_id: &'a str,
    background_color: &'a str,
    css: Option<&'a str>,
    icon_packs: &'a [IconPack],
}

/// Serializes `value` as JSON that is also safe to embed in an HTML script
/// block: `<`, `>`, `&` and the JS line separators are `\u` escaped.
pub fn script_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let json = serde_json::to_string(value)?;
    let mut out = String::with_capacity(json.len());
    for ch in json.chars() {
        match ch {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    Ok(out)
}

/// Builds the full page for `definition`.
///
/// Fails only when the diagram configuration cannot be encoded; every other
/// problem surfaces later through the page's completion record.
pub fn build_page(
    definition: &str,
    options: &RenderOptions,
    assets: &RendererAssets,
) -> Result<String> {
    let input = PageInput {
        config: options.diagram_config.as_map(),
        definition,
        svg_id: options.svg_id(),
        background_color: options.background_color.as_css(),
        css: options.css.as_deref().filter(|css| !css.is_empty()),
        icon_packs: &options.icon_packs,
    };
    let input_json = script_json(&input).map_err(RenderError::ConfigSerialization)?;

    let extension_len = assets.extension.as_ref().map_or(0, String::len);
    let mut page = String::with_capacity(
        PAGE_HEAD.len()
            + assets.library.len()
            + extension_len
            + DRIVER_SCRIPT.len()
            + input_json.len()
            + 256,
    );
    page.push_str(PAGE_HEAD);
    push_script(&mut page, &assets.library);
    if let Some(extension) = &assets.extension {
        push_script(&mut page, extension);
    }
    page.push_str("  <script>");
    page.push_str(DRIVER_SCRIPT);
    page.push_str("    renderDiagram(");
    page.push_str(&input_json);
    page.push_str(");\n  </script>\n");
    page.push_str(PAGE_TAIL);
    Ok(page)
}

fn push_script(page: &mut String, source: &str) {
    page.push_str("  <script>");
    page.push_str(source);
    page.push_str("</script>\n");
}
