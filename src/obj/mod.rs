// MIT License
//
// Copyright (c) 2025 Takatoshi Kondo
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Dynamic value model: borrowed tagged-union values, single-shot arena
//! allocation, bounded vector builders, and map schema validation.

mod arena;
pub use arena::Arena;

mod buffer;
pub use buffer::{str_to_int64, substr};

mod object;
pub use object::{deep_copy, map_get, Kv, List, Map, Obj, ObjType, MAX_OBJ_DEPTH};

mod schema;
pub use schema::{map_validate, SchemaEntry};

mod vec;
pub use vec::{BufVec, ByteVec, KvVec, ObjVec};

/// Type alias for HashMap to provide a stable API abstraction over the
/// underlying hash map implementation (currently hashbrown::HashMap).
pub type HashMap<K, V> = hashbrown::HashMap<K, V>;

/// Type alias for HashSet to provide a stable API abstraction over the
/// underlying hash set implementation (currently hashbrown::HashSet).
pub type HashSet<T> = hashbrown::HashSet<T>;
