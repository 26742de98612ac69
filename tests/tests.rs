// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

mod analyzer;
mod common;
mod lexer;
mod parser;
mod rewriter;
