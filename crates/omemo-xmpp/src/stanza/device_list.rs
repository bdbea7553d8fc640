// omemo-xmpp/stanza
//
// License: Mozilla Public License v2.0 (MPL v2.0)
//
// `list`/`device` elements per spec.md §6, grounded on prose-xmpp's
// `stanza::omemo::{Device, DeviceList}` (same `TryFrom<Element>`/
// `From<T> for Element` shape, generalized to decode either the legacy
// `eu.siacs.conversations.axolotl` namespace or the modern
// `urn:xmpp:omemo:0` one).

use minidom::{Element, NSChoice};

use omemo_core::models::DeviceList;

use crate::element_ext::ElementExt;
use crate::ns;

fn omemo_ns_choice() -> NSChoice<'static> {
    NSChoice::AnyOf(&[ns::LEGACY_OMEMO, ns::OMEMO])
}

pub fn decode_device_list(element: &Element) -> anyhow::Result<DeviceList> {
    element.expect_is("list", omemo_ns_choice())?;

    let mut device_ids = Vec::new();
    let mut labels = Vec::new();
    for child in element.children() {
        child.expect_is("device", omemo_ns_choice())?;
        device_ids.push(child.req_attr("id")?.parse::<u32>()?.into());
        labels.push(child.attr("label").map(ToString::to_string));
    }

    Ok(DeviceList { device_ids, labels })
}

pub fn encode_device_list(list: &DeviceList) -> Element {
    let mut builder = Element::builder("list", ns::LEGACY_OMEMO);
    for (index, id) in list.device_ids.iter().enumerate() {
        let label = list.labels.get(index).cloned().flatten();
        let mut device = Element::builder("device", ns::LEGACY_OMEMO).attr("id", u32::from(*id));
        if let Some(label) = label {
            device = device.attr("label", label);
        }
        builder = builder.append(device.build());
    }
    builder.build()
}
