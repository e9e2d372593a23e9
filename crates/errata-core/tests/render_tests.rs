use errata_core::{render_page, MarkerShape, MarkerStyle, MistakeMarker, RenderError, MARKER_GROUP_ID};
use errata_domain_eval::DiffKind;
use errata_domain_score::PageSize;
use errata_ports::types::Rect;
use pretty_assertions::assert_eq;

const PAGE: PageSize = PageSize {
    index: 0,
    width: 600.0,
    height: 800.0,
};

fn missing_marker() -> MistakeMarker {
    MistakeMarker {
        page: 0,
        rect: Rect::new(30.0, 702.0, 36.0, 706.0),
        kind: DiffKind::Missing,
        color: "#e53935".to_string(),
        shape: MarkerShape::Cross,
    }
}

const IMAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="600pt" height="800pt" viewBox="0 0 600 800">
<g id="surface1"><path d="M 10 10 L 20 20" stroke="black"/></g>
</svg>
"#;

#[test]
fn page_image_content_is_kept_and_one_group_is_appended() {
    let marker = missing_marker();
    let svg = render_page(&PAGE, [&marker], Some(IMAGE), &MarkerStyle::default()).expect("render");

    let close = IMAGE.rfind("</svg>").expect("closing tag");
    assert!(svg.starts_with(&IMAGE[..close]));
    assert!(svg.ends_with("</g>\n</svg>\n"));
    assert_eq!(svg.matches(MARKER_GROUP_ID).count(), 1);

    let doc = roxmltree::Document::parse(&svg).expect("output stays well-formed");
    let groups: Vec<Option<&str>> = doc
        .root_element()
        .children()
        .filter(|n| n.is_element())
        .map(|n| n.attribute("id"))
        .collect();
    assert_eq!(groups, vec![Some("surface1"), Some(MARKER_GROUP_ID)]);
}

#[test]
fn rendering_twice_gives_identical_output() {
    let marker = missing_marker();
    let style = MarkerStyle::default();
    let first = render_page(&PAGE, [&marker], Some(IMAGE), &style).expect("render");
    let second = render_page(&PAGE, [&marker], Some(IMAGE), &style).expect("render");
    assert_eq!(first, second);
}

#[test]
fn scaled_page_images_get_a_transform() {
    let image = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 1200 1600"><rect width="1" height="1"/></svg>"#;
    let svg = render_page(&PAGE, [&missing_marker()], Some(image), &MarkerStyle::default())
        .expect("render");
    assert!(svg.contains(r#"<g id="errata-mistakes" transform="translate(0 0) scale(2 2)">"#));
}

#[test]
fn self_closing_root_is_opened_up() {
    let image = r#"<svg xmlns="http://www.w3.org/2000/svg" width="600" height="800"/>"#;
    let svg = render_page(&PAGE, [&missing_marker()], Some(image), &MarkerStyle::default())
        .expect("render");

    let doc = roxmltree::Document::parse(&svg).expect("output stays well-formed");
    assert_eq!(doc.root_element().attribute("width"), Some("600"));
    assert!(doc
        .descendants()
        .any(|n| n.attribute("id") == Some(MARKER_GROUP_ID)));
}

#[test]
fn standalone_overlay_uses_the_crop_frame() {
    let svg = render_page(&PAGE, [&missing_marker()], None, &MarkerStyle::default()).expect("render");
    assert!(svg.starts_with(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 600 800" width="600" height="800">"#
    ));
    assert!(svg.contains("M30.00,94.00 L36.00,98.00"));
}

#[test]
fn broken_page_images_are_rejected() {
    let style = MarkerStyle::default();
    let err = render_page(&PAGE, [], Some("<svg><g></svg>"), &style).expect_err("malformed");
    assert!(matches!(err, RenderError::Parse { page: 0, .. }));

    let err = render_page(&PAGE, [], Some("<html/>"), &style).expect_err("not svg");
    assert!(matches!(err, RenderError::NotSvg { .. }));
}
