/**
 * MIT License
 *
 * Copyright (c) 2025 Takatoshi Kondo
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */

/// Match a topic name against a topic filter per MQTT 3.1.1 rules.
///
/// `+` matches exactly one level (including an empty one), `#` matches any
/// number of trailing levels including none and must be the last level of
/// the filter. Filters starting with a wildcard never match topics whose
/// first level starts with `$`.
pub fn topic_filter_match(filter: &[u8], topic: &[u8]) -> bool {
    if filter.is_empty() || topic.is_empty() {
        return false;
    }
    if topic[0] == b'$' && (filter[0] == b'+' || filter[0] == b'#') {
        return false;
    }

    let mut filter_levels = filter.split(|&b| b == b'/');
    let mut topic_levels = topic.split(|&b| b == b'/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some(b"#"), _) => return filter_levels.next().is_none(),
            (Some(level), Some(topic_level)) => {
                if level != b"+" && level != topic_level {
                    return false;
                }
            }
            // "sport/#" also matches "sport".
            (Some(level), None) => return level == b"#" && filter_levels.next().is_none(),
            (None, Some(_)) => return false,
            (None, None) => return true,
        }
    }
}
